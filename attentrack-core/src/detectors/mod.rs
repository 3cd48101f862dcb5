//! Signal detectors
//!
//! Three independent sensors feed the tracker:
//! - [`VisibilityDetector`]: page visibility and window focus, reported by the host
//! - [`IdleDetector`]: input activity, reported by the host, polled against a threshold
//! - [`GazeDetector`]: camera frames classified by head pose
//!
//! Each detector owns its resource (host event channel, timer, camera stream)
//! and a task that turns observations into [`SignalSender::propose`] calls.
//! `stop()` cancels that task and waits for it, so no signal is produced by a
//! detector after its `stop()` returns.

use async_trait::async_trait;

use crate::arbiter::SignalSender;
use crate::error::Result;
use crate::types::{DetectorId, DetectorStatus};

pub mod gaze;
pub mod idle;
pub mod visibility;

pub use gaze::GazeDetector;
pub use idle::{ActivityHandle, ActivityKind, IdleDetector};
pub use visibility::{VisibilityDetector, VisibilityHandle};

/// Common lifecycle of every sensor
#[async_trait]
pub trait Detector: Send {
    /// Which sensor this is
    fn id(&self) -> DetectorId;

    /// Acquire resources and begin emitting signals.
    ///
    /// Capability and resource failures are not returned as errors: the
    /// detector marks itself degraded and tracking continues without it.
    async fn start(&mut self, signals: SignalSender) -> Result<()>;

    /// Cancel the detector's task, release its resources and wait for both
    async fn stop(&mut self);

    fn status(&self) -> DetectorStatus;
}
