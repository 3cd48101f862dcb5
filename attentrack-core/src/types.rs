//! Core domain types for attentrack
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **State** | One of focused, distracted, away, idle, paused; exactly one is active |
//! | **Transition** | An accepted change of state, appended to the session log |
//! | **Event** | The notification derived from a transition, delivered to subscribers |
//! | **Signal** | A detector's proposal for what the state should be |
//! | **Detector** | A sensor (tab visibility, input idle, gaze) that emits signals |
//!
//! Detectors never change the state themselves. They propose, the arbiter picks
//! the winning proposal, and the state machine records the result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Attention State
// ============================================

/// Canonical attention state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionState {
    /// Looking at the study material
    Focused,
    /// Present but looking away from the screen
    Distracted,
    /// Tab or window is not visible
    Away,
    /// No input for longer than the idle threshold
    Idle,
    /// Suspended by the tracker; detectors cannot leave this state
    Paused,
}

impl AttentionState {
    /// Returns the identifier used on the wire and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionState::Focused => "focused",
            AttentionState::Distracted => "distracted",
            AttentionState::Away => "away",
            AttentionState::Idle => "idle",
            AttentionState::Paused => "paused",
        }
    }

    /// Arbitration priority; the highest proposal wins.
    ///
    /// `away > idle > distracted > focused`. `Paused` is never proposed by a
    /// detector and ranks below everything.
    pub fn priority(&self) -> u8 {
        match self {
            AttentionState::Away => 4,
            AttentionState::Idle => 3,
            AttentionState::Distracted => 2,
            AttentionState::Focused => 1,
            AttentionState::Paused => 0,
        }
    }
}

impl std::fmt::Display for AttentionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AttentionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focused" => Ok(AttentionState::Focused),
            "distracted" => Ok(AttentionState::Distracted),
            "away" => Ok(AttentionState::Away),
            "idle" => Ok(AttentionState::Idle),
            "paused" => Ok(AttentionState::Paused),
            _ => Err(format!("unknown attention state: {}", s)),
        }
    }
}

// ============================================
// Transitions and Events
// ============================================

/// An accepted state change. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: AttentionState,
    pub to: AttentionState,
    /// Milliseconds since the state machine's origin
    pub timestamp_ms: u64,
}

/// Kind of event derived from a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionEventType {
    FocusChange,
    TabSwitch,
    LookAway,
    Idle,
    Return,
}

impl AttentionEventType {
    /// Derive the event type from the state being entered.
    ///
    /// This mapping is part of the event-log format and must not change.
    pub fn for_target(to: AttentionState) -> Self {
        match to {
            AttentionState::Focused => AttentionEventType::Return,
            AttentionState::Away => AttentionEventType::TabSwitch,
            AttentionState::Idle => AttentionEventType::Idle,
            AttentionState::Distracted => AttentionEventType::LookAway,
            AttentionState::Paused => AttentionEventType::FocusChange,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionEventType::FocusChange => "focus_change",
            AttentionEventType::TabSwitch => "tab_switch",
            AttentionEventType::LookAway => "look_away",
            AttentionEventType::Idle => "idle",
            AttentionEventType::Return => "return",
        }
    }
}

/// Notification emitted once per accepted transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionEvent {
    #[serde(rename = "type")]
    pub event_type: AttentionEventType,
    pub from: AttentionState,
    pub to: AttentionState,
    /// Milliseconds since the state machine's origin
    pub timestamp_ms: u64,
    /// How long the state being left was held
    pub previous_state_duration_ms: u64,
}

impl AttentionEvent {
    pub fn from_transition(transition: &StateTransition, previous_state_duration_ms: u64) -> Self {
        Self {
            event_type: AttentionEventType::for_target(transition.to),
            from: transition.from,
            to: transition.to,
            timestamp_ms: transition.timestamp_ms,
            previous_state_duration_ms,
        }
    }
}

// ============================================
// Detectors and Signals
// ============================================

/// Identifies which sensor produced a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorId {
    TabVisibility,
    Idle,
    Gaze,
}

impl DetectorId {
    pub const ALL: [DetectorId; 3] = [
        DetectorId::TabVisibility,
        DetectorId::Idle,
        DetectorId::Gaze,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorId::TabVisibility => "tab_visibility",
            DetectorId::Idle => "idle",
            DetectorId::Gaze => "gaze",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            DetectorId::TabVisibility => 0,
            DetectorId::Idle => 1,
            DetectorId::Gaze => 2,
        }
    }
}

impl std::fmt::Display for DetectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime health of a detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DetectorStatus {
    /// Constructed but not started
    Inactive,
    /// Running and emitting signals
    Active,
    /// Could not start or lost its resource; contributes no signals
    Degraded(String),
    /// Resources released
    Stopped,
}

impl DetectorStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, DetectorStatus::Active)
    }
}

// ============================================
// Metrics
// ============================================

/// Point-in-time view of a session's accumulated attention
///
/// Recomputed on demand from the state machine; never stored. Includes the
/// time spent in the still-open current state. Time spent paused is not
/// counted anywhere, so `focused + distracted + away + idle == total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttentionMetrics {
    pub session_id: String,
    pub current_state: AttentionState,
    pub total_ms: u64,
    pub focused_ms: u64,
    pub distracted_ms: u64,
    pub away_ms: u64,
    pub idle_ms: u64,
    pub tab_switch_count: u32,
    pub look_away_count: u32,
    pub idle_count: u32,
    /// Percentage of tracked time spent focused, 0..=100
    pub focus_score: u8,
    /// Percentage of tracked time spent focused or distracted, 0..=100
    pub engagement_score: u8,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}
