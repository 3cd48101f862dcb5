//! Camera-based gaze/head-pose detector
//!
//! Built from an injected [`Camera`] and [`ModelLoader`]; nothing is
//! discovered at runtime. On start it checks the permission flag, opens a
//! low-resolution stream, loads the landmark model, and then samples one
//! frame per poll interval on a cancellable task.
//!
//! Every failure on the way up leaves the detector degraded and the camera
//! released. A degraded detector never proposes anything, which the arbiter
//! reads as "looking", so a broken camera can only cost accuracy, never
//! produce false look-aways.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::arbiter::SignalSender;
use crate::config::AttentionConfig;
use crate::error::Result;
use crate::types::{AttentionState, DetectorId, DetectorStatus};

use super::Detector;

pub mod camera;
pub mod pose;

pub use camera::{
    Camera, CameraConstraints, CameraStream, FaceLandmarks, Frame, LandmarkModel, ModelLoader,
    Point,
};
pub use pose::{GazeClassifier, HeadPose, Observation, PoseThresholds};

pub struct GazeDetector {
    camera: Arc<dyn Camera>,
    loader: Arc<dyn ModelLoader>,
    constraints: CameraConstraints,
    permission_granted: bool,
    poll_interval: Duration,
    classifier: GazeClassifier,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    status: Arc<std::sync::Mutex<DetectorStatus>>,
}

impl GazeDetector {
    pub fn new(
        camera: Arc<dyn Camera>,
        loader: Arc<dyn ModelLoader>,
        config: &AttentionConfig,
    ) -> Self {
        Self {
            camera,
            loader,
            constraints: CameraConstraints::default(),
            permission_granted: config.camera_permission_granted,
            poll_interval: config.gaze_poll_interval(),
            classifier: GazeClassifier::from_config(config),
            cancel: None,
            task: None,
            status: Arc::new(std::sync::Mutex::new(DetectorStatus::Inactive)),
        }
    }

    pub fn with_constraints(mut self, constraints: CameraConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    fn set_status(&self, status: DetectorStatus) {
        set_status(&self.status, status);
    }

    fn degrade(&self, reason: String) {
        tracing::warn!(reason = %reason, "Gaze tracking unavailable, continuing without it");
        self.set_status(DetectorStatus::Degraded(reason));
    }
}

fn set_status(slot: &std::sync::Mutex<DetectorStatus>, status: DetectorStatus) {
    match slot.lock() {
        Ok(mut guard) => *guard = status,
        Err(poisoned) => *poisoned.into_inner() = status,
    }
}

#[async_trait]
impl Detector for GazeDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Gaze
    }

    async fn start(&mut self, signals: SignalSender) -> Result<()> {
        if self.task.is_some() {
            return Ok(());
        }

        if !self.permission_granted {
            self.degrade("camera permission not granted".to_string());
            return Ok(());
        }

        let mut stream = match self.camera.open(self.constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                self.degrade(format!("camera unavailable: {}", e));
                return Ok(());
            }
        };

        let model = match self.loader.load().await {
            Ok(model) => model,
            Err(e) => {
                stream.stop_tracks();
                self.degrade(format!("landmark model failed to load: {}", e));
                return Ok(());
            }
        };

        // The permission prompt and model download can take long enough for
        // the tracker to have been stopped meanwhile.
        if signals.cancellation().is_cancelled() {
            stream.stop_tracks();
            self.set_status(DetectorStatus::Stopped);
            return Ok(());
        }

        let cancel = signals.cancellation().child_token();
        let task = tokio::spawn(poll_gaze(
            stream,
            model,
            self.classifier.clone(),
            signals,
            cancel.clone(),
            self.poll_interval,
            Arc::clone(&self.status),
        ));

        self.cancel = Some(cancel);
        self.task = Some(task);
        self.set_status(DetectorStatus::Active);
        tracing::info!(
            width = self.constraints.width,
            height = self.constraints.height,
            poll_ms = self.poll_interval.as_millis() as u64,
            "Gaze detector started"
        );
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Gaze task failed to join");
            }
        }
        if !matches!(self.status(), DetectorStatus::Degraded(_)) {
            self.set_status(DetectorStatus::Stopped);
        }
    }

    fn status(&self) -> DetectorStatus {
        match self.status.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Bounded-rate sampling loop. Owns the stream and stops its tracks on every exit path.
async fn poll_gaze(
    mut stream: Box<dyn CameraStream>,
    mut model: Box<dyn LandmarkModel>,
    mut classifier: GazeClassifier,
    signals: SignalSender,
    cancel: CancellationToken,
    poll_interval: Duration,
    status: Arc<std::sync::Mutex<DetectorStatus>>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Inference is awaited under the same cancellation so an in-flight
        // frame cannot produce a signal after stop.
        let sample = tokio::select! {
            _ = cancel.cancelled() => break,
            sample = sample_frame(stream.as_mut(), model.as_mut()) => sample,
        };

        let observation = match sample {
            Sample::Observed(observation) => observation,
            Sample::Ended(reason) => {
                set_status(&status, DetectorStatus::Degraded(reason.clone()));
                tracing::warn!(
                    reason = %reason,
                    "Camera stream ended, assuming the user is looking"
                );
                if classifier.proposed() != AttentionState::Focused {
                    signals.propose(AttentionState::Focused);
                }
                break;
            }
        };

        if let Some(state) = classifier.observe(observation, Instant::now()) {
            tracing::debug!(state = %state, "Gaze proposal changed");
            signals.propose(state);
        }
    }

    stream.stop_tracks();
    tracing::debug!(live_tracks = stream.live_tracks(), "Gaze loop shutting down");
}

enum Sample {
    Observed(Observation),
    Ended(String),
}

async fn sample_frame(stream: &mut dyn CameraStream, model: &mut dyn LandmarkModel) -> Sample {
    let frame = match stream.next_frame().await {
        Ok(Some(frame)) => frame,
        Ok(None) => return Sample::Ended("camera stream ended".to_string()),
        Err(e) => {
            tracing::debug!(error = %e, "Dropped camera frame");
            return Sample::Observed(Observation::NoFace);
        }
    };

    match model.detect(&frame).await {
        Ok(Some(landmarks)) => match HeadPose::from_landmarks(&landmarks) {
            Some(pose) => Sample::Observed(Observation::Face(pose)),
            None => Sample::Observed(Observation::NoFace),
        },
        Ok(None) => Sample::Observed(Observation::NoFace),
        Err(e) => {
            tracing::debug!(error = %e, "Landmark inference failed");
            Sample::Observed(Observation::NoFace)
        }
    }
}
