//! Wire types for the attention backend
//!
//! [`MetricsReport`] is the body of `POST /attention/metrics`; its field names
//! are fixed by the backend. The read-side types are parsed leniently since
//! the core only consumes them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::AttentionMetrics;

/// Body of `POST /attention/metrics`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub session_id: String,
    pub total_seconds: u64,
    pub focused_seconds: u64,
    pub distracted_seconds: u64,
    pub away_seconds: u64,
    pub tab_switch_count: u32,
    pub look_away_count: u32,
    pub idle_count: u32,
    pub focus_score: u8,
    pub engagement_score: u8,
    /// Unix seconds
    pub start_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_session_id: Option<String>,
    pub gaze_tracking_used: bool,
}

impl MetricsReport {
    pub fn from_metrics(
        metrics: &AttentionMetrics,
        study_session_id: Option<&str>,
        gaze_tracking_used: bool,
    ) -> Self {
        Self {
            session_id: metrics.session_id.clone(),
            total_seconds: rounded_seconds(metrics.total_ms),
            focused_seconds: rounded_seconds(metrics.focused_ms),
            distracted_seconds: rounded_seconds(metrics.distracted_ms),
            away_seconds: rounded_seconds(metrics.away_ms),
            tab_switch_count: metrics.tab_switch_count,
            look_away_count: metrics.look_away_count,
            idle_count: metrics.idle_count,
            focus_score: metrics.focus_score.min(100),
            engagement_score: metrics.engagement_score.min(100),
            start_time: metrics.start_time.timestamp(),
            study_session_id: study_session_id.map(str::to_string),
            gaze_tracking_used,
        }
    }
}

fn rounded_seconds(ms: u64) -> u64 {
    (ms + 500) / 1000
}

/// Tracking preferences stored by the backend (`GET|PUT /attention/preferences`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionPreferences {
    #[serde(default = "default_true")]
    pub tracking_enabled: bool,
    #[serde(default)]
    pub gaze_tracking_enabled: bool,
    #[serde(default = "default_true")]
    pub tab_tracking_enabled: bool,
    #[serde(default = "default_true")]
    pub idle_tracking_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_threshold_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub look_away_threshold_seconds: Option<u64>,
}

impl Default for AttentionPreferences {
    fn default() -> Self {
        Self {
            tracking_enabled: true,
            gaze_tracking_enabled: false,
            tab_tracking_enabled: true,
            idle_tracking_enabled: true,
            idle_threshold_seconds: None,
            look_away_threshold_seconds: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Response of `GET /attention/analytics?days=N`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttentionAnalytics {
    #[serde(default)]
    pub days: u32,
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub average_focus_score: f64,
    #[serde(default)]
    pub average_engagement_score: f64,
    #[serde(default)]
    pub trend: Vec<TrendPoint>,
    /// Hours of day (0-23) with the best focus
    #[serde(default)]
    pub peak_hours: Vec<u8>,
    #[serde(default)]
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub focus_score: f64,
}

/// One entry of `GET /attention/daily-summary?days=N`
#[derive(Debug, Clone, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    #[serde(default)]
    pub total_seconds: u64,
    #[serde(default)]
    pub focused_seconds: u64,
    #[serde(default)]
    pub session_count: u32,
    #[serde(default)]
    pub average_focus_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttentionState;
    use chrono::{TimeZone, Utc};

    fn metrics() -> AttentionMetrics {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        AttentionMetrics {
            session_id: "s-1".to_string(),
            current_state: AttentionState::Focused,
            total_ms: 25_400,
            focused_ms: 10_000,
            distracted_ms: 0,
            away_ms: 15_400,
            idle_ms: 0,
            tab_switch_count: 1,
            look_away_count: 0,
            idle_count: 0,
            focus_score: 39,
            engagement_score: 39,
            start_time: start,
            last_update: start,
        }
    }

    #[test]
    fn test_report_field_names() {
        let report = MetricsReport::from_metrics(&metrics(), Some("study-9"), false);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["session_id"], "s-1");
        assert_eq!(json["total_seconds"], 25);
        assert_eq!(json["away_seconds"], 15);
        assert_eq!(json["tab_switch_count"], 1);
        assert_eq!(json["focus_score"], 39);
        assert_eq!(json["start_time"], 1_772_355_600_i64);
        assert_eq!(json["study_session_id"], "study-9");
        assert_eq!(json["gaze_tracking_used"], false);
        assert_eq!(json.as_object().unwrap().len(), 13);
    }

    #[test]
    fn test_study_session_id_omitted_when_absent() {
        let report = MetricsReport::from_metrics(&metrics(), None, true);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("study_session_id").is_none());
        assert_eq!(json.as_object().unwrap().len(), 12);
    }

    #[test]
    fn test_rounded_seconds() {
        assert_eq!(rounded_seconds(0), 0);
        assert_eq!(rounded_seconds(499), 0);
        assert_eq!(rounded_seconds(500), 1);
        assert_eq!(rounded_seconds(9_999), 10);
    }

    #[test]
    fn test_parse_sparse_analytics() {
        let analytics: AttentionAnalytics = serde_json::from_str(
            r#"{"days": 7, "trend": [{"date": "2026-03-01", "focus_score": 72.5}], "unknown": 1}"#,
        )
        .unwrap();
        assert_eq!(analytics.days, 7);
        assert_eq!(analytics.trend.len(), 1);
        assert!(analytics.insights.is_empty());
    }

    #[test]
    fn test_parse_preferences_defaults() {
        let prefs: AttentionPreferences =
            serde_json::from_str(r#"{"gaze_tracking_enabled": true}"#).unwrap();
        assert!(prefs.tracking_enabled);
        assert!(prefs.gaze_tracking_enabled);
        assert_eq!(prefs.idle_threshold_seconds, None);
    }
}
