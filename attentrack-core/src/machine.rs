//! Attention state machine
//!
//! Single source of truth for the current attention state. Every accepted
//! transition closes the previous state's interval, adds it to that state's
//! accumulator and appends to the transition log. Metrics are derived from the
//! accumulators plus the still-open interval, so they always read "as of now".

use tokio::time::Instant;

use crate::types::{AttentionEvent, AttentionState, StateTransition};

/// Accumulated time and counters, before session identity is attached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateTotals {
    pub focused_ms: u64,
    pub distracted_ms: u64,
    pub away_ms: u64,
    pub idle_ms: u64,
    pub paused_ms: u64,
    pub tab_switch_count: u32,
    pub look_away_count: u32,
    pub idle_count: u32,
}

impl StateTotals {
    /// Tracked time; paused time is excluded.
    pub fn total_ms(&self) -> u64 {
        self.focused_ms + self.distracted_ms + self.away_ms + self.idle_ms
    }

    /// `round(focused / total * 100)`, 100 when nothing has been tracked yet
    pub fn focus_score(&self) -> u8 {
        percentage(self.focused_ms, self.total_ms())
    }

    /// `round((focused + distracted) / total * 100)`, 100 when nothing has been tracked yet
    pub fn engagement_score(&self) -> u8 {
        percentage(self.focused_ms + self.distracted_ms, self.total_ms())
    }

    fn add(&mut self, state: AttentionState, ms: u64) {
        match state {
            AttentionState::Focused => self.focused_ms += ms,
            AttentionState::Distracted => self.distracted_ms += ms,
            AttentionState::Away => self.away_ms += ms,
            AttentionState::Idle => self.idle_ms += ms,
            AttentionState::Paused => self.paused_ms += ms,
        }
    }
}

fn percentage(part: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (part as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Owns the current state, its accumulators and the transition log
#[derive(Debug)]
pub struct AttentionStateMachine {
    current: AttentionState,
    origin: Instant,
    state_started: Instant,
    totals: StateTotals,
    transitions: Vec<StateTransition>,
}

impl AttentionStateMachine {
    /// Opens in `Focused` with the origin at `now`
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(origin: Instant) -> Self {
        Self {
            current: AttentionState::Focused,
            origin,
            state_started: origin,
            totals: StateTotals::default(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> AttentionState {
        self.current
    }

    /// Append-only log of accepted transitions
    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn transition(&mut self, to: AttentionState) -> Option<AttentionEvent> {
        self.transition_at(to, Instant::now())
    }

    /// Move to `to` as of `at`.
    ///
    /// Returns `None` without recording anything when `to` is already the
    /// current state. An `at` before the current state's start counts as a
    /// zero-length interval.
    pub fn transition_at(&mut self, to: AttentionState, at: Instant) -> Option<AttentionEvent> {
        if to == self.current {
            return None;
        }

        let at = at.max(self.state_started);
        let duration_ms = millis(at.duration_since(self.state_started));
        self.totals.add(self.current, duration_ms);

        let transition = StateTransition {
            from: self.current,
            to,
            timestamp_ms: millis(at.duration_since(self.origin)),
        };
        self.transitions.push(transition);

        match to {
            AttentionState::Away => self.totals.tab_switch_count += 1,
            AttentionState::Distracted => self.totals.look_away_count += 1,
            AttentionState::Idle => self.totals.idle_count += 1,
            AttentionState::Focused | AttentionState::Paused => {}
        }

        self.current = to;
        self.state_started = at;

        tracing::debug!(
            from = %transition.from,
            to = %transition.to,
            previous_ms = duration_ms,
            "Attention state transition"
        );

        Some(AttentionEvent::from_transition(&transition, duration_ms))
    }

    pub fn totals(&self) -> StateTotals {
        self.totals_at(Instant::now())
    }

    /// Accumulators including the open interval of the current state up to `at`
    pub fn totals_at(&self, at: Instant) -> StateTotals {
        let mut totals = self.totals;
        let open_ms = millis(at.max(self.state_started).duration_since(self.state_started));
        totals.add(self.current, open_ms);
        totals
    }

    /// When the current state was entered
    pub fn state_started(&self) -> Instant {
        self.state_started
    }

    /// Clear accumulators, counters and log; reopen in `Focused` at `now`
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, origin: Instant) {
        *self = Self::starting_at(origin);
    }
}

impl Default for AttentionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttentionEventType;
    use std::time::Duration;

    fn secs(origin: Instant, s: u64) -> Instant {
        origin + Duration::from_secs(s)
    }

    #[test]
    fn test_opens_focused_with_full_scores() {
        let origin = Instant::now();
        let machine = AttentionStateMachine::starting_at(origin);
        let totals = machine.totals_at(origin);

        assert_eq!(machine.current(), AttentionState::Focused);
        assert_eq!(totals.total_ms(), 0);
        assert_eq!(totals.focus_score(), 100);
        assert_eq!(totals.engagement_score(), 100);
    }

    #[test]
    fn test_same_state_is_noop() {
        let origin = Instant::now();
        let mut machine = AttentionStateMachine::starting_at(origin);

        assert!(machine
            .transition_at(AttentionState::Focused, secs(origin, 3))
            .is_none());
        assert!(machine.transitions().is_empty());
    }

    #[test]
    fn test_tab_switch_scenario() {
        let origin = Instant::now();
        let mut machine = AttentionStateMachine::starting_at(origin);

        let event = machine
            .transition_at(AttentionState::Away, secs(origin, 10))
            .unwrap();
        assert_eq!(event.event_type, AttentionEventType::TabSwitch);
        assert_eq!(event.previous_state_duration_ms, 10_000);
        assert_eq!(event.timestamp_ms, 10_000);

        let event = machine
            .transition_at(AttentionState::Focused, secs(origin, 25))
            .unwrap();
        assert_eq!(event.event_type, AttentionEventType::Return);
        assert_eq!(event.previous_state_duration_ms, 15_000);

        let totals = machine.totals_at(secs(origin, 25));
        assert_eq!(totals.focused_ms, 10_000);
        assert_eq!(totals.away_ms, 15_000);
        assert_eq!(totals.tab_switch_count, 1);
        assert_eq!(totals.focus_score(), 40);
        assert_eq!(totals.engagement_score(), 40);
    }

    #[test]
    fn test_totals_include_open_state() {
        let origin = Instant::now();
        let mut machine = AttentionStateMachine::starting_at(origin);
        machine.transition_at(AttentionState::Distracted, secs(origin, 4));

        let totals = machine.totals_at(secs(origin, 10));
        assert_eq!(totals.focused_ms, 4_000);
        assert_eq!(totals.distracted_ms, 6_000);
        assert_eq!(totals.look_away_count, 1);
        assert_eq!(totals.focus_score(), 40);
        assert_eq!(totals.engagement_score(), 100);
    }

    #[test]
    fn test_paused_time_is_not_tracked() {
        let origin = Instant::now();
        let mut machine = AttentionStateMachine::starting_at(origin);
        let event = machine
            .transition_at(AttentionState::Paused, secs(origin, 5))
            .unwrap();
        assert_eq!(event.event_type, AttentionEventType::FocusChange);
        machine.transition_at(AttentionState::Focused, secs(origin, 65));

        let totals = machine.totals_at(secs(origin, 70));
        assert_eq!(totals.paused_ms, 60_000);
        assert_eq!(totals.total_ms(), 10_000);
        assert_eq!(totals.focus_score(), 100);
    }

    #[test]
    fn test_invariants_over_mixed_sequence() {
        let origin = Instant::now();
        let mut machine = AttentionStateMachine::starting_at(origin);
        let sequence = [
            (AttentionState::Distracted, 3),
            (AttentionState::Idle, 7),
            (AttentionState::Away, 8),
            (AttentionState::Away, 9),
            (AttentionState::Focused, 20),
            (AttentionState::Paused, 21),
            (AttentionState::Idle, 30),
            (AttentionState::Focused, 41),
        ];

        let mut previous = machine.totals_at(origin);
        for (state, at) in sequence {
            machine.transition_at(state, secs(origin, at));
            for instant in [at, at + 1] {
                let totals = machine.totals_at(secs(origin, instant));
                assert_eq!(
                    totals.focused_ms + totals.distracted_ms + totals.away_ms + totals.idle_ms,
                    totals.total_ms()
                );
                assert!(totals.focus_score() <= 100);
                assert!(totals.engagement_score() <= 100);
                assert!(totals.focused_ms >= previous.focused_ms);
                assert!(totals.distracted_ms >= previous.distracted_ms);
                assert!(totals.away_ms >= previous.away_ms);
                assert!(totals.idle_ms >= previous.idle_ms);
                assert!(totals.tab_switch_count >= previous.tab_switch_count);
                assert!(totals.idle_count >= previous.idle_count);
                previous = totals;
            }
        }

        // Away at 9 repeated the current state and was dropped
        assert_eq!(machine.transitions().len(), 7);
        assert_eq!(previous.idle_count, 2);
    }

    #[test]
    fn test_earlier_timestamp_clamps_to_zero_duration() {
        let origin = Instant::now();
        let mut machine = AttentionStateMachine::starting_at(origin);
        machine.transition_at(AttentionState::Away, secs(origin, 10));

        let event = machine
            .transition_at(AttentionState::Focused, secs(origin, 5))
            .unwrap();
        assert_eq!(event.previous_state_duration_ms, 0);
        assert_eq!(event.timestamp_ms, 10_000);
    }

    #[test]
    fn test_reset_clears_everything() {
        let origin = Instant::now();
        let mut machine = AttentionStateMachine::starting_at(origin);
        machine.transition_at(AttentionState::Idle, secs(origin, 60));

        machine.reset_at(secs(origin, 61));
        let totals = machine.totals_at(secs(origin, 61));

        assert_eq!(machine.current(), AttentionState::Focused);
        assert!(machine.transitions().is_empty());
        assert_eq!(totals, StateTotals::default());
    }
}
