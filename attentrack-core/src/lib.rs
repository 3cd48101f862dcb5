//! # attentrack-core
//!
//! Attention tracking engine for study sessions.
//!
//! This library provides:
//! - A session state machine with per-state time accounting and scores
//! - Independent detectors for tab visibility, input idleness and head pose
//! - Priority arbitration between detectors over a single signal queue
//! - Best-effort metrics sync with the attention backend
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Signals flow one way:
//! - **Detectors** observe the host (visibility, input) or the camera and
//!   push proposals into a queue
//! - **Arbitration** keeps each detector's latest proposal and applies the
//!   highest-priority one (`away > idle > distracted > focused`)
//! - **The state machine** closes the previous state's interval, counts the
//!   transition and emits an event
//! - **Reporting** snapshots metrics on an interval and once more on stop
//!
//! ## Example
//!
//! ```rust,no_run
//! use attentrack_core::{AttentionTracker, Config};
//!
//! # async fn run() -> attentrack_core::Result<()> {
//! let config = Config::load()?;
//! let mut tracker = AttentionTracker::from_config(&config)?
//!     .study_session("study-42")
//!     .build()?;
//!
//! let visibility = tracker.visibility_handle();
//! tracker.start().await?;
//!
//! visibility.page_hidden();
//! // ...
//! let metrics = tracker.stop().await?;
//! println!("focus score: {}", metrics.focus_score);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::{AttentionConfig, Config};
pub use error::{CameraError, Error, Result};
pub use machine::AttentionStateMachine;
pub use tracker::{AttentionTracker, TrackerBuilder, TrackerStatus};
pub use types::*;

// Public modules
pub mod arbiter;
pub mod config;
pub mod detectors;
pub mod error;
pub mod logging;
pub mod machine;
pub mod sync;
pub mod tracker;
pub mod types;
