//! Signal queue and arbitration
//!
//! Detectors never call into the state machine. Each one holds a
//! [`SignalSender`] that pushes tagged proposals into a single unbounded
//! queue. The tracker drains that queue on one task, records each detector's
//! latest proposal in an [`Arbiter`] and transitions to the highest-priority
//! proposal. Ordering of detector callbacks therefore cannot decide the state.

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::types::{AttentionState, DetectorId};

/// A detector's proposal for the session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub detector: DetectorId,
    pub proposed: AttentionState,
    pub at: Instant,
}

/// Sending half of the signal queue, bound to one detector
///
/// Once the tracker's run is cancelled, sends are dropped so that nothing a
/// detector does after `stop()` can reach the state machine.
#[derive(Debug, Clone)]
pub struct SignalSender {
    detector: DetectorId,
    tx: mpsc::UnboundedSender<Signal>,
    cancel: CancellationToken,
}

impl SignalSender {
    pub fn new(
        detector: DetectorId,
        tx: mpsc::UnboundedSender<Signal>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            detector,
            tx,
            cancel,
        }
    }

    pub fn detector(&self) -> DetectorId {
        self.detector
    }

    /// Propose `state` as of now. Returns false if the proposal was dropped.
    pub fn propose(&self, state: AttentionState) -> bool {
        if self.cancel.is_cancelled() {
            tracing::debug!(
                detector = %self.detector,
                state = %state,
                "Dropping signal after stop"
            );
            return false;
        }
        let signal = Signal {
            detector: self.detector,
            proposed: state,
            at: Instant::now(),
        };
        self.tx.send(signal).is_ok()
    }

    /// Token cancelled when the detector must stop emitting
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Holds each detector's latest proposal and resolves them by priority
#[derive(Debug, Default, Clone)]
pub struct Arbiter {
    proposals: [Option<AttentionState>; DetectorId::ALL.len()],
}

impl Arbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a detector's proposal. Returns false if it was rejected.
    pub fn record(&mut self, signal: &Signal) -> bool {
        if signal.proposed == AttentionState::Paused {
            tracing::warn!(
                detector = %signal.detector,
                "Detector proposed paused; only the tracker may pause"
            );
            return false;
        }
        let previous = self.proposals[signal.detector.index()].replace(signal.proposed);

        // Coming back to the tab is activity: idleness that accrued while
        // away never surfaces as its own state.
        if signal.detector == DetectorId::TabVisibility
            && previous == Some(AttentionState::Away)
            && signal.proposed != AttentionState::Away
            && self.proposal(DetectorId::Idle) == Some(AttentionState::Idle)
        {
            tracing::debug!("Dropping idle proposal on return to the tab");
            self.proposals[DetectorId::Idle.index()] = None;
        }
        true
    }

    pub fn proposal(&self, detector: DetectorId) -> Option<AttentionState> {
        self.proposals[detector.index()]
    }

    /// Highest-priority proposal across detectors; `Focused` when nobody objects
    pub fn resolve(&self) -> AttentionState {
        self.proposals
            .iter()
            .flatten()
            .copied()
            .max_by_key(AttentionState::priority)
            .unwrap_or(AttentionState::Focused)
    }

    /// Forget every proposal
    pub fn clear(&mut self) {
        self.proposals = [None; DetectorId::ALL.len()];
    }
}
