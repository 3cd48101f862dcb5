//! Input-idle detector
//!
//! Tracks the time of the last input reported through an [`ActivityHandle`]
//! and polls it against the idle threshold. Crossing the threshold proposes
//! `Idle` once; the next input proposes `Focused` straight away.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::arbiter::SignalSender;
use crate::error::{Error, Result};
use crate::types::{AttentionState, DetectorId, DetectorStatus};

use super::Detector;

const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Input events that count as activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    PointerMove,
    PointerDown,
    KeyPress,
    Scroll,
    Touch,
}

/// Host-side handle for reporting user input
#[derive(Debug, Clone)]
pub struct ActivityHandle {
    tx: mpsc::UnboundedSender<ActivityKind>,
}

impl ActivityHandle {
    pub fn record(&self, kind: ActivityKind) {
        let _ = self.tx.send(kind);
    }
}

pub struct IdleDetector {
    threshold: Duration,
    poll_interval: Duration,
    activity: Option<mpsc::UnboundedReceiver<ActivityKind>>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    status: DetectorStatus,
}

impl IdleDetector {
    pub fn new(threshold: Duration) -> (Self, ActivityHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let detector = Self {
            threshold,
            poll_interval: IDLE_POLL_INTERVAL,
            activity: Some(rx),
            cancel: None,
            task: None,
            status: DetectorStatus::Inactive,
        };
        (detector, ActivityHandle { tx })
    }
}

#[async_trait]
impl Detector for IdleDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Idle
    }

    async fn start(&mut self, signals: SignalSender) -> Result<()> {
        let activity = self
            .activity
            .take()
            .ok_or_else(|| Error::InvalidState("idle detector already started".to_string()))?;

        let cancel = signals.cancellation().child_token();
        let task = tokio::spawn(watch_idle(
            activity,
            signals,
            cancel.clone(),
            self.threshold,
            self.poll_interval,
        ));

        self.cancel = Some(cancel);
        self.task = Some(task);
        self.status = DetectorStatus::Active;
        tracing::info!(threshold_ms = self.threshold.as_millis() as u64, "Idle detector started");
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Idle task failed to join");
            }
        }
        self.activity = None;
        self.status = DetectorStatus::Stopped;
    }

    fn status(&self) -> DetectorStatus {
        self.status.clone()
    }
}

async fn watch_idle(
    mut activity: mpsc::UnboundedReceiver<ActivityKind>,
    signals: SignalSender,
    cancel: CancellationToken,
    threshold: Duration,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_activity = Instant::now();
    let mut idle = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            kind = activity.recv() => {
                let Some(kind) = kind else { break };
                last_activity = Instant::now();
                if idle {
                    idle = false;
                    tracing::debug!(?kind, "Activity after idle");
                    signals.propose(AttentionState::Focused);
                }
            }
            _ = ticker.tick() => {
                if !idle && last_activity.elapsed() >= threshold {
                    idle = true;
                    tracing::debug!(
                        idle_ms = last_activity.elapsed().as_millis() as u64,
                        "Idle threshold crossed"
                    );
                    signals.propose(AttentionState::Idle);
                }
            }
        }
    }

    tracing::debug!("Idle watcher shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::Signal;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn started(
        threshold: Duration,
    ) -> (IdleDetector, ActivityHandle, mpsc::UnboundedReceiver<Signal>) {
        let (mut detector, handle) = IdleDetector::new(threshold);
        let (tx, rx) = mpsc::unbounded_channel();
        detector
            .start(SignalSender::new(DetectorId::Idle, tx, CancellationToken::new()))
            .await
            .unwrap();
        (detector, handle, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_then_clears_on_activity() {
        let start = Instant::now();
        let (mut detector, handle, mut rx) = started(Duration::from_secs(5)).await;

        tokio::time::sleep(Duration::from_secs(6)).await;
        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.proposed, AttentionState::Idle);
        assert!(signal.at.duration_since(start) >= Duration::from_secs(5));
        assert!(signal.at.duration_since(start) < Duration::from_secs(6));

        // Still idle on later polls, but no repeat
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(rx.try_recv().is_err());

        handle.record(ActivityKind::PointerMove);
        settle().await;
        assert_eq!(rx.try_recv().unwrap().proposed, AttentionState::Focused);

        detector.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_regular_activity_never_idles() {
        let (mut detector, handle, mut rx) = started(Duration::from_secs(5)).await;

        for _ in 0..10 {
            tokio::time::sleep(Duration::from_secs(3)).await;
            handle.record(ActivityKind::KeyPress);
            settle().await;
        }

        assert!(rx.try_recv().is_err());
        detector.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_while_active_is_silent() {
        let (mut detector, handle, mut rx) = started(Duration::from_secs(60)).await;

        handle.record(ActivityKind::Scroll);
        handle.record(ActivityKind::Touch);
        settle().await;

        assert!(rx.try_recv().is_err());
        detector.stop().await;
        assert_eq!(detector.status(), DetectorStatus::Stopped);
    }
}
