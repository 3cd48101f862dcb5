//! Tab-visibility detector
//!
//! The host forwards page-visibility changes and window blur/focus through a
//! [`VisibilityHandle`]. Both are folded into one "visible" flag. Leaving
//! visibility arms a grace timer; coming back before it fires is treated as a
//! quick switch and produces no signal.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::arbiter::SignalSender;
use crate::error::{Error, Result};
use crate::types::{AttentionState, DetectorId, DetectorStatus};

use super::Detector;

/// Raw host notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityEvent {
    PageHidden,
    PageShown,
    WindowBlurred,
    WindowFocused,
}

/// Host-side handle for reporting visibility changes
///
/// Cheap to clone. Reports made after the detector stops are ignored.
#[derive(Debug, Clone)]
pub struct VisibilityHandle {
    tx: mpsc::UnboundedSender<VisibilityEvent>,
}

impl VisibilityHandle {
    pub fn report(&self, event: VisibilityEvent) {
        let _ = self.tx.send(event);
    }

    pub fn page_hidden(&self) {
        self.report(VisibilityEvent::PageHidden);
    }

    pub fn page_shown(&self) {
        self.report(VisibilityEvent::PageShown);
    }

    pub fn window_blurred(&self) {
        self.report(VisibilityEvent::WindowBlurred);
    }

    pub fn window_focused(&self) {
        self.report(VisibilityEvent::WindowFocused);
    }
}

pub struct VisibilityDetector {
    grace_period: Duration,
    events: Option<mpsc::UnboundedReceiver<VisibilityEvent>>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    status: DetectorStatus,
}

impl VisibilityDetector {
    /// Create the detector and the handle the host reports through
    pub fn new(grace_period: Duration) -> (Self, VisibilityHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let detector = Self {
            grace_period,
            events: Some(rx),
            cancel: None,
            task: None,
            status: DetectorStatus::Inactive,
        };
        (detector, VisibilityHandle { tx })
    }
}

#[async_trait]
impl Detector for VisibilityDetector {
    fn id(&self) -> DetectorId {
        DetectorId::TabVisibility
    }

    async fn start(&mut self, signals: SignalSender) -> Result<()> {
        let events = self
            .events
            .take()
            .ok_or_else(|| Error::InvalidState("visibility detector already started".to_string()))?;

        let cancel = signals.cancellation().child_token();
        let task = tokio::spawn(watch_visibility(
            events,
            signals,
            cancel.clone(),
            self.grace_period,
        ));

        self.cancel = Some(cancel);
        self.task = Some(task);
        self.status = DetectorStatus::Active;
        tracing::info!(
            grace_ms = self.grace_period.as_millis() as u64,
            "Tab-visibility detector started"
        );
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Tab-visibility task failed to join");
            }
        }
        self.events = None;
        self.status = DetectorStatus::Stopped;
    }

    fn status(&self) -> DetectorStatus {
        self.status.clone()
    }
}

async fn watch_visibility(
    mut events: mpsc::UnboundedReceiver<VisibilityEvent>,
    signals: SignalSender,
    cancel: CancellationToken,
    grace_period: Duration,
) {
    let mut page_visible = true;
    let mut window_focused = true;
    let mut visible = true;
    // Set while hidden but still inside the grace period
    let mut away_deadline: Option<Instant> = None;
    let mut away_reported = false;

    loop {
        let deadline = away_deadline.unwrap_or_else(Instant::now);

        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    VisibilityEvent::PageHidden => page_visible = false,
                    VisibilityEvent::PageShown => page_visible = true,
                    VisibilityEvent::WindowBlurred => window_focused = false,
                    VisibilityEvent::WindowFocused => window_focused = true,
                }

                let now_visible = page_visible && window_focused;
                if now_visible == visible {
                    continue;
                }
                visible = now_visible;

                if visible {
                    if away_deadline.take().is_some() {
                        tracing::debug!("Tab switch within grace period ignored");
                    } else if away_reported {
                        away_reported = false;
                        signals.propose(AttentionState::Focused);
                    }
                } else if grace_period.is_zero() {
                    away_reported = true;
                    signals.propose(AttentionState::Away);
                } else {
                    away_deadline = Some(Instant::now() + grace_period);
                }
            }
            _ = tokio::time::sleep_until(deadline), if away_deadline.is_some() => {
                away_deadline = None;
                away_reported = true;
                signals.propose(AttentionState::Away);
            }
        }
    }

    tracing::debug!("Tab-visibility watcher shutting down");
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
        grace: Duration,
    ) -> (
        VisibilityDetector,
        VisibilityHandle,
        mpsc::UnboundedReceiver<Signal>,
        CancellationToken,
    ) {
        let (mut detector, handle) = VisibilityDetector::new(grace);
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        detector
            .start(SignalSender::new(DetectorId::TabVisibility, tx, cancel.clone()))
            .await
            .unwrap();
        (detector, handle, rx, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_without_grace_is_immediately_away() {
        let (mut detector, handle, mut rx, _cancel) = started(Duration::ZERO).await;

        handle.page_hidden();
        settle().await;
        assert_eq!(rx.try_recv().unwrap().proposed, AttentionState::Away);

        handle.page_shown();
        settle().await;
        assert_eq!(rx.try_recv().unwrap().proposed, AttentionState::Focused);

        detector.stop().await;
        assert_eq!(detector.status(), DetectorStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_states_are_collapsed() {
        let (mut detector, handle, mut rx, _cancel) = started(Duration::ZERO).await;

        // Hidden page and blurred window are the same "not visible"
        handle.page_hidden();
        handle.window_blurred();
        handle.page_hidden();
        settle().await;
        assert_eq!(rx.try_recv().unwrap().proposed, AttentionState::Away);
        assert!(rx.try_recv().is_err());

        // Still blurred, so showing the page alone is not enough
        handle.page_shown();
        settle().await;
        assert!(rx.try_recv().is_err());

        handle.window_focused();
        settle().await;
        assert_eq!(rx.try_recv().unwrap().proposed, AttentionState::Focused);

        detector.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_switch_within_grace_is_ignored() {
        let (mut detector, handle, mut rx, _cancel) = started(Duration::from_secs(2)).await;

        handle.window_blurred();
        settle().await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.window_focused();
        settle().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(rx.try_recv().is_err());
        detector.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_away_after_grace_expires() {
        let (mut detector, handle, mut rx, _cancel) = started(Duration::from_secs(2)).await;
        let hidden_at = Instant::now();

        handle.page_hidden();
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(3)).await;
        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.proposed, AttentionState::Away);
        let delay = signal.at.duration_since(hidden_at);
        assert!(delay >= Duration::from_secs(2) && delay < Duration::from_millis(2_100));

        handle.page_shown();
        settle().await;
        assert_eq!(rx.try_recv().unwrap().proposed, AttentionState::Focused);

        detector.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_signals_after_stop() {
        let (mut detector, handle, mut rx, _cancel) = started(Duration::ZERO).await;
        detector.stop().await;

        handle.page_hidden();
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (mut detector, _handle, _rx, cancel) = started(Duration::ZERO).await;
        let (tx, _rx2) = mpsc::unbounded_channel();
        let second = detector
            .start(SignalSender::new(DetectorId::TabVisibility, tx, cancel))
            .await;
        assert!(second.is_err());
        detector.stop().await;
    }
}
