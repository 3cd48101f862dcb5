//! Attention tracker
//!
//! The tracker is the only public entry point to a running session. It owns
//! the detectors, the [`Session`] (state machine, arbiter, identity) and two
//! background tasks:
//!
//! - **arbitration**: drains the signal queue, records proposals and applies
//!   the winning state to the state machine
//! - **reporting**: publishes a metrics snapshot every `report_interval_ms`
//!
//! Lifecycle: `Idle → Running ⇄ Paused → Stopped`. `Stopped` is terminal; a new
//! session needs a new tracker.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::arbiter::{Arbiter, Signal, SignalSender};
use crate::config::{AttentionConfig, Config};
use crate::detectors::{
    ActivityHandle, Detector, GazeDetector, IdleDetector, VisibilityDetector, VisibilityHandle,
};
use crate::error::{Error, Result};
use crate::machine::AttentionStateMachine;
use crate::sync::{MetricsPublisher, MetricsReporter, PublishStats};
use crate::types::{
    AttentionEvent, AttentionMetrics, AttentionState, DetectorId, DetectorStatus, StateTransition,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle of a tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Idle,
    Running,
    Paused,
    Stopped,
}

// ============================================
// Session
// ============================================

/// One bounded tracking interval: identity, state machine and arbitration
#[derive(Debug)]
pub struct Session {
    id: String,
    started_at: DateTime<Utc>,
    study_session_id: Option<String>,
    config: AttentionConfig,
    machine: AttentionStateMachine,
    arbiter: Arbiter,
    status: TrackerStatus,
    stopped_at: Option<Instant>,
    gaze_tracking_used: bool,
}

impl Session {
    fn new(config: AttentionConfig, study_session_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            study_session_id,
            config,
            machine: AttentionStateMachine::new(),
            arbiter: Arbiter::new(),
            status: TrackerStatus::Idle,
            stopped_at: None,
            gaze_tracking_used: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn status(&self) -> TrackerStatus {
        self.status
    }

    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    pub fn current_state(&self) -> AttentionState {
        self.machine.current()
    }

    pub fn transitions(&self) -> &[StateTransition] {
        self.machine.transitions()
    }

    pub fn metrics(&self) -> AttentionMetrics {
        self.metrics_at(Instant::now())
    }

    /// Snapshot as of `at`. Nothing accrues before start, and a stopped
    /// session is frozen at its stop time.
    pub fn metrics_at(&self, at: Instant) -> AttentionMetrics {
        let at = match (self.status, self.stopped_at) {
            (_, Some(stopped)) => at.min(stopped),
            (TrackerStatus::Idle, None) => self.machine.state_started(),
            _ => at,
        };
        let totals = self.machine.totals_at(at);

        AttentionMetrics {
            session_id: self.id.clone(),
            current_state: self.machine.current(),
            total_ms: totals.total_ms(),
            focused_ms: totals.focused_ms,
            distracted_ms: totals.distracted_ms,
            away_ms: totals.away_ms,
            idle_ms: totals.idle_ms,
            tab_switch_count: totals.tab_switch_count,
            look_away_count: totals.look_away_count,
            idle_count: totals.idle_count,
            focus_score: totals.focus_score(),
            engagement_score: totals.engagement_score(),
            start_time: self.started_at,
            last_update: Utc::now(),
        }
    }

    fn begin(&mut self, now: Instant) {
        self.started_at = Utc::now();
        self.machine.reset_at(now);
        self.arbiter.clear();
        self.status = TrackerStatus::Running;
    }

    /// Apply one tick's worth of queued signals
    fn apply(&mut self, batch: &[Signal]) -> Option<AttentionEvent> {
        if matches!(self.status, TrackerStatus::Idle | TrackerStatus::Stopped) {
            tracing::debug!(
                signals = batch.len(),
                status = ?self.status,
                "Ignoring signals outside a running session"
            );
            return None;
        }

        for signal in batch {
            self.arbiter.record(signal);
        }
        if self.status == TrackerStatus::Paused {
            return None;
        }

        let at = batch.iter().map(|s| s.at).max()?;
        self.machine.transition_at(self.arbiter.resolve(), at)
    }

    /// Bring the machine in line with the lifecycle and current proposals
    fn settle(&mut self, now: Instant) -> Option<AttentionEvent> {
        let target = match self.status {
            TrackerStatus::Paused => AttentionState::Paused,
            TrackerStatus::Running => self.arbiter.resolve(),
            TrackerStatus::Idle | TrackerStatus::Stopped => return None,
        };
        self.machine.transition_at(target, now)
    }
}

// ============================================
// Builder
// ============================================

/// Configures and wires a tracker; nothing starts until [`AttentionTracker::start`]
pub struct TrackerBuilder {
    config: AttentionConfig,
    gaze: Option<GazeDetector>,
    publisher: Option<MetricsPublisher>,
    study_session_id: Option<String>,
}

impl TrackerBuilder {
    /// Gaze implementation for this session. Ignored unless gaze tracking is enabled.
    pub fn gaze(mut self, detector: GazeDetector) -> Self {
        self.gaze = Some(detector);
        self
    }

    pub fn publisher(mut self, publisher: MetricsPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn reporter(self, reporter: Arc<dyn MetricsReporter>) -> Self {
        self.publisher(MetricsPublisher::new(reporter))
    }

    /// Study session the attention data belongs to
    pub fn study_session(mut self, id: impl Into<String>) -> Self {
        self.study_session_id = Some(id.into());
        self
    }

    pub fn build(self) -> Result<AttentionTracker> {
        self.config.validate()?;

        let (visibility, visibility_handle) =
            VisibilityDetector::new(self.config.tab_switch_grace_period());
        let (idle, activity_handle) = IdleDetector::new(self.config.idle_threshold());

        // Gaze last so that stop() can tear it down first
        let mut detectors: Vec<Box<dyn Detector>> = Vec::new();
        if self.config.enable_tab_tracking {
            detectors.push(Box::new(visibility));
        }
        if self.config.enable_idle_tracking {
            detectors.push(Box::new(idle));
        }
        match (self.config.enable_gaze_tracking, self.gaze) {
            (true, Some(gaze)) => detectors.push(Box::new(gaze)),
            (true, None) => tracing::info!("Gaze tracking enabled but no gaze detector supplied"),
            (false, _) => {}
        }

        let publisher = match self.publisher {
            Some(publisher) => publisher,
            None => MetricsPublisher::new(Arc::new(crate::sync::NullReporter)),
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(AttentionTracker {
            session: Arc::new(Mutex::new(Session::new(self.config, self.study_session_id))),
            detectors,
            publisher: Arc::new(publisher),
            events,
            visibility: visibility_handle,
            activity: activity_handle,
            run: None,
        })
    }
}

// ============================================
// Tracker
// ============================================

struct Run {
    cancel: CancellationToken,
    reporting_cancel: CancellationToken,
    arbitration: JoinHandle<()>,
    reporting: JoinHandle<()>,
}

/// Orchestrates detectors, arbitration and reporting for one session
pub struct AttentionTracker {
    session: Arc<Mutex<Session>>,
    detectors: Vec<Box<dyn Detector>>,
    publisher: Arc<MetricsPublisher>,
    events: broadcast::Sender<AttentionEvent>,
    visibility: VisibilityHandle,
    activity: ActivityHandle,
    run: Option<Run>,
}

impl AttentionTracker {
    pub fn builder(config: AttentionConfig) -> TrackerBuilder {
        TrackerBuilder {
            config,
            gaze: None,
            publisher: None,
            study_session_id: None,
        }
    }

    /// Builder seeded from the `[tracking]` and `[sync]` sections of a config file
    pub fn from_config(config: &Config) -> Result<TrackerBuilder> {
        let publisher = MetricsPublisher::from_config(&config.sync)?;
        Ok(Self::builder(config.tracking.clone()).publisher(publisher))
    }

    /// Handle the host reports page visibility and window focus through
    pub fn visibility_handle(&self) -> VisibilityHandle {
        self.visibility.clone()
    }

    /// Handle the host reports user input through
    pub fn activity_handle(&self) -> ActivityHandle {
        self.activity.clone()
    }

    /// Receive an event for every accepted transition
    pub fn subscribe(&self) -> broadcast::Receiver<AttentionEvent> {
        self.events.subscribe()
    }

    /// Begin tracking. A no-op while running or paused.
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut session = self.session.lock().await;
            match session.status {
                TrackerStatus::Running | TrackerStatus::Paused => return Ok(()),
                TrackerStatus::Stopped => {
                    return Err(Error::InvalidState(
                        "tracker was stopped; start a new session instead".to_string(),
                    ))
                }
                TrackerStatus::Idle => session.begin(Instant::now()),
            }
        }

        let cancel = CancellationToken::new();
        let reporting_cancel = cancel.child_token();
        let (tx, rx) = mpsc::unbounded_channel();

        let arbitration = tokio::spawn(arbitrate(
            rx,
            Arc::clone(&self.session),
            self.events.clone(),
            cancel.child_token(),
        ));

        let interval = { self.session.lock().await.config.report_interval() };
        let reporting = tokio::spawn(report_periodically(
            Arc::clone(&self.session),
            Arc::clone(&self.publisher),
            interval,
            reporting_cancel.clone(),
        ));

        for detector in self.detectors.iter_mut() {
            let signals = SignalSender::new(detector.id(), tx.clone(), cancel.clone());
            if let Err(e) = detector.start(signals).await {
                tracing::warn!(detector = %detector.id(), error = %e, "Detector failed to start");
            }
        }

        let gaze_tracking_used = self
            .detectors
            .iter()
            .any(|d| d.id() == DetectorId::Gaze && d.status().is_active());

        let session_id = {
            let mut session = self.session.lock().await;
            session.gaze_tracking_used = gaze_tracking_used;
            session.id.clone()
        };

        self.run = Some(Run {
            cancel,
            reporting_cancel,
            arbitration,
            reporting,
        });

        tracing::info!(
            session_id = %session_id,
            detectors = self.detectors.len(),
            gaze_tracking_used,
            "Attention tracking started"
        );
        Ok(())
    }

    /// Suspend tracking without tearing down detectors
    pub async fn pause(&mut self) -> Result<()> {
        let event = {
            let mut session = self.session.lock().await;
            match session.status {
                TrackerStatus::Paused => return Ok(()),
                TrackerStatus::Running => {}
                status => {
                    return Err(Error::InvalidState(format!("cannot pause a {:?} tracker", status)))
                }
            }
            session.status = TrackerStatus::Paused;
            session.machine.transition_at(AttentionState::Paused, Instant::now())
        };

        self.emit(event);
        tracing::info!("Attention tracking paused");
        Ok(())
    }

    /// Return to `Focused`, then to whatever the detectors currently report
    pub async fn resume(&mut self) -> Result<()> {
        let events = {
            let mut session = self.session.lock().await;
            match session.status {
                TrackerStatus::Running => return Ok(()),
                TrackerStatus::Paused => {}
                status => {
                    return Err(Error::InvalidState(format!("cannot resume a {:?} tracker", status)))
                }
            }
            let now = Instant::now();
            session.status = TrackerStatus::Running;
            let forced = session.machine.transition_at(AttentionState::Focused, now);
            [forced, session.settle(now)]
        };

        for event in events {
            self.emit(event);
        }
        tracing::info!("Attention tracking resumed");
        Ok(())
    }

    /// Start a fresh session id and empty metrics, keeping detectors wired
    pub async fn reset(&mut self) -> Result<()> {
        let (event, session_id) = {
            let mut session = self.session.lock().await;
            if session.status == TrackerStatus::Stopped {
                return Err(Error::InvalidState("cannot reset a stopped tracker".to_string()));
            }
            let now = Instant::now();
            session.id = Uuid::new_v4().to_string();
            session.started_at = Utc::now();
            session.machine.reset_at(now);
            (session.settle(now), session.id.clone())
        };

        self.emit(event);
        tracing::info!(session_id = %session_id, "Attention session reset");
        Ok(())
    }

    /// End the session.
    ///
    /// Cancels reporting, stops the gaze loop and every other detector
    /// (releasing the camera), closes arbitration, then sends one final
    /// report and returns the final snapshot. Calling it again returns the
    /// same snapshot without reporting.
    pub async fn stop(&mut self) -> Result<AttentionMetrics> {
        let run = self.run.take();

        if let Some(run) = &run {
            run.reporting_cancel.cancel();
        }

        let was_tracking = {
            let mut session = self.session.lock().await;
            let was_tracking =
                matches!(session.status, TrackerStatus::Running | TrackerStatus::Paused);
            if session.status != TrackerStatus::Stopped {
                // A session that never started tracked nothing
                let stopped_at = if was_tracking {
                    Instant::now()
                } else {
                    session.machine.state_started()
                };
                session.status = TrackerStatus::Stopped;
                session.stopped_at = Some(stopped_at);
            }
            was_tracking
        };

        let Some(run) = run else {
            return Ok(self.session.lock().await.metrics());
        };

        if let Err(e) = run.reporting.await {
            tracing::warn!(error = %e, "Reporting task failed to join");
        }

        for detector in self.detectors.iter_mut().rev() {
            detector.stop().await;
        }

        run.cancel.cancel();
        if let Err(e) = run.arbitration.await {
            tracing::warn!(error = %e, "Arbitration task failed to join");
        }

        let (metrics, study_session_id, gaze_tracking_used) = {
            let session = self.session.lock().await;
            (
                session.metrics(),
                session.study_session_id.clone(),
                session.gaze_tracking_used,
            )
        };

        if was_tracking {
            self.publisher
                .publish(&metrics, study_session_id.as_deref(), gaze_tracking_used)
                .await;
        }

        tracing::info!(
            session_id = %metrics.session_id,
            total_ms = metrics.total_ms,
            focus_score = metrics.focus_score,
            "Attention tracking stopped"
        );
        Ok(metrics)
    }

    pub async fn status(&self) -> TrackerStatus {
        self.session.lock().await.status
    }

    pub async fn session_id(&self) -> String {
        self.session.lock().await.id.clone()
    }

    pub async fn current_state(&self) -> AttentionState {
        self.session.lock().await.current_state()
    }

    /// Snapshot of the session as of now
    pub async fn metrics(&self) -> AttentionMetrics {
        self.session.lock().await.metrics()
    }

    /// Copy of the session's transition log
    pub async fn transitions(&self) -> Vec<StateTransition> {
        self.session.lock().await.transitions().to_vec()
    }

    pub fn detector_statuses(&self) -> Vec<(DetectorId, DetectorStatus)> {
        self.detectors.iter().map(|d| (d.id(), d.status())).collect()
    }

    pub fn publish_stats(&self) -> PublishStats {
        self.publisher.stats()
    }

    fn emit(&self, event: Option<AttentionEvent>) {
        if let Some(event) = event {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

impl Drop for AttentionTracker {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            tracing::warn!("Attention tracker dropped without stop(); cancelling tasks");
            run.cancel.cancel();
        }
    }
}

/// Single consumer of the signal queue
async fn arbitrate(
    mut signals: mpsc::UnboundedReceiver<Signal>,
    session: Arc<Mutex<Session>>,
    events: broadcast::Sender<AttentionEvent>,
    cancel: CancellationToken,
) {
    loop {
        let first = tokio::select! {
            _ = cancel.cancelled() => break,
            signal = signals.recv() => match signal {
                Some(signal) => signal,
                None => break,
            },
        };

        // Everything already queued belongs to the same tick
        let mut batch = vec![first];
        while let Ok(signal) = signals.try_recv() {
            batch.push(signal);
        }

        let event = session.lock().await.apply(&batch);
        if let Some(event) = event {
            tracing::debug!(event = event.event_type.as_str(), to = %event.to, "Attention event");
            let _ = events.send(event);
        }
    }

    tracing::debug!("Arbitration task shutting down");
}

async fn report_periodically(
    session: Arc<Mutex<Session>>,
    publisher: Arc<MetricsPublisher>,
    interval: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let snapshot = {
            let session = session.lock().await;
            (session.status == TrackerStatus::Running).then(|| {
                (
                    session.metrics(),
                    session.study_session_id.clone(),
                    session.gaze_tracking_used,
                )
            })
        };
        let Some((metrics, study_session_id, gaze_tracking_used)) = snapshot else {
            continue;
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = publisher.publish(&metrics, study_session_id.as_deref(), gaze_tracking_used) => {}
        }
    }

    tracing::debug!("Reporting task shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn signal(detector: DetectorId, proposed: AttentionState, at: Instant) -> Signal {
        Signal {
            detector,
            proposed,
            at,
        }
    }

    fn running_session() -> Session {
        let mut session = Session::new(AttentionConfig::default(), None);
        session.begin(Instant::now());
        session
    }

    #[test]
    fn test_idle_session_ignores_signals() {
        let mut session = Session::new(AttentionConfig::default(), None);
        let away = signal(DetectorId::TabVisibility, AttentionState::Away, Instant::now());
        let event = session.apply(&[away]);
        assert!(event.is_none());
        assert_eq!(session.current_state(), AttentionState::Focused);
    }

    #[test]
    fn test_batch_resolved_by_priority() {
        let mut session = running_session();
        let at = Instant::now() + Duration::from_secs(1);
        let event = session
            .apply(&[
                signal(DetectorId::TabVisibility, AttentionState::Away, at),
                signal(DetectorId::Gaze, AttentionState::Distracted, at),
                signal(DetectorId::TabVisibility, AttentionState::Focused, at),
            ])
            .unwrap();

        // The tab came back within the tick; gaze is the remaining objection
        assert_eq!(event.to, AttentionState::Distracted);
        assert_eq!(session.transitions().len(), 1);
    }

    #[test]
    fn test_paused_session_records_but_holds() {
        let mut session = running_session();
        session.status = TrackerStatus::Paused;
        session.machine.transition(AttentionState::Paused);

        let at = Instant::now();
        assert!(session
            .apply(&[signal(DetectorId::Idle, AttentionState::Idle, at)])
            .is_none());
        assert_eq!(session.current_state(), AttentionState::Paused);

        session.status = TrackerStatus::Running;
        let event = session.settle(at).unwrap();
        assert_eq!(event.to, AttentionState::Idle);
    }

    #[test]
    fn test_stopped_session_metrics_are_frozen() {
        let mut session = running_session();
        let stopped = Instant::now();
        session.status = TrackerStatus::Stopped;
        session.stopped_at = Some(stopped);

        let later = session.metrics_at(stopped + Duration::from_secs(60));
        let at_stop = session.metrics_at(stopped);
        assert_eq!(later.total_ms, at_stop.total_ms);
    }
}
