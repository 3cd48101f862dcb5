//! Best-effort metrics publishing
//!
//! The publisher turns snapshots into reports and hands them to a
//! [`MetricsReporter`]. A failed report is logged and dropped: there is no
//! retry and no replay queue, since the next report re-baselines from the
//! session's current totals anyway.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::types::AttentionMetrics;

use super::client::MetricsClient;
use super::report::MetricsReport;

/// Destination for metrics reports
#[async_trait]
pub trait MetricsReporter: Send + Sync {
    async fn report(&self, report: &MetricsReport) -> Result<()>;
}

/// Reporter used when sync is disabled; discards everything
#[derive(Debug, Default)]
pub struct NullReporter;

#[async_trait]
impl MetricsReporter for NullReporter {
    async fn report(&self, report: &MetricsReport) -> Result<()> {
        tracing::trace!(session_id = %report.session_id, "Sync disabled, report discarded");
        Ok(())
    }
}

/// Publishing statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Reports accepted by the reporter
    pub reports_sent: usize,
    /// Reports lost to errors
    pub reports_dropped: usize,
}

/// Sends reports through a reporter and keeps delivery counts
pub struct MetricsPublisher {
    reporter: Arc<dyn MetricsReporter>,
    sent: AtomicUsize,
    dropped: AtomicUsize,
}

impl MetricsPublisher {
    pub fn new(reporter: Arc<dyn MetricsReporter>) -> Self {
        Self {
            reporter,
            sent: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Publisher for the configured backend, or a discarding one when sync is off
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        if !config.is_ready() {
            tracing::info!("Metrics sync disabled");
            return Ok(Self::new(Arc::new(NullReporter)));
        }
        let client = MetricsClient::new(config)?;
        Ok(Self::new(Arc::new(client)))
    }

    /// Report one snapshot. Returns whether it was delivered; never fails.
    pub async fn publish(
        &self,
        metrics: &AttentionMetrics,
        study_session_id: Option<&str>,
        gaze_tracking_used: bool,
    ) -> bool {
        let report = MetricsReport::from_metrics(metrics, study_session_id, gaze_tracking_used);

        match self.reporter.report(&report).await {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    session_id = %report.session_id,
                    total_seconds = report.total_seconds,
                    focus_score = report.focus_score,
                    "Published attention metrics"
                );
                true
            }
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    session_id = %report.session_id,
                    error = %e,
                    "Failed to publish attention metrics, report dropped"
                );
                false
            }
        }
    }

    pub fn stats(&self) -> PublishStats {
        PublishStats {
            reports_sent: self.sent.load(Ordering::Relaxed),
            reports_dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
