//! Metrics sync with the attention backend
//!
//! ## Architecture
//!
//! Sync is strictly best-effort:
//! - Reports are built from a fresh snapshot each time, so nothing is buffered
//! - Network failures are logged and the report is dropped
//! - Tracking never waits on or fails because of the backend
//!
//! ## Usage
//!
//! Enable sync in `~/.config/attentrack/config.toml`:
//!
//! ```toml
//! [sync]
//! enabled = true
//! server_url = "https://study.example.com/api"
//! api_token = "xxxxxxxx"
//! ```

mod client;
mod publisher;
mod report;

pub use client::MetricsClient;
pub use publisher::{MetricsPublisher, MetricsReporter, NullReporter, PublishStats};
pub use report::{
    AttentionAnalytics, AttentionPreferences, DailySummary, MetricsReport, TrendPoint,
};
