//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/attentrack/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/attentrack/` (~/.config/attentrack/)
//! - State/Logs: `$XDG_STATE_HOME/attentrack/` (~/.local/state/attentrack/)
//!
//! The `[tracking]` table supplies the defaults for each session's
//! [`AttentionConfig`]. A session's config is fixed once tracking starts;
//! changing it means starting a new session.

use crate::error::{Error, Result};
use crate::sync::AttentionPreferences;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Default per-session tracking configuration
    #[serde(default)]
    pub tracking: AttentionConfig,

    /// Metrics backend configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-session attention tracking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionConfig {
    /// Use the camera-based gaze detector
    #[serde(default)]
    pub enable_gaze_tracking: bool,

    /// Use the tab-visibility detector
    #[serde(default = "default_true")]
    pub enable_tab_tracking: bool,

    /// Use the input-idle detector
    #[serde(default = "default_true")]
    pub enable_idle_tracking: bool,

    /// Continuous time not looking at the screen before counting as distracted
    #[serde(default = "default_look_away_threshold_ms")]
    pub look_away_threshold_ms: u64,

    /// Time without input before counting as idle
    #[serde(default = "default_idle_threshold_ms")]
    pub idle_threshold_ms: u64,

    /// Hidden-tab time ignored before counting as away
    #[serde(default = "default_tab_switch_grace_period_ms")]
    pub tab_switch_grace_period_ms: u64,

    /// Interval between metrics reports while running
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,

    /// Whether the user has granted camera access
    #[serde(default)]
    pub camera_permission_granted: bool,

    /// Gaze sampling interval
    #[serde(default = "default_gaze_poll_interval_ms")]
    pub gaze_poll_interval_ms: u64,

    /// Consecutive no-face polls tolerated before the subject counts as not looking
    #[serde(default = "default_no_face_grace_frames")]
    pub no_face_grace_frames: u32,

    /// Largest head yaw (degrees) still counted as looking at the screen
    #[serde(default = "default_max_yaw_degrees")]
    pub max_yaw_degrees: f32,

    /// Largest head pitch (degrees) still counted as looking at the screen
    #[serde(default = "default_max_pitch_degrees")]
    pub max_pitch_degrees: f32,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            enable_gaze_tracking: false,
            enable_tab_tracking: true,
            enable_idle_tracking: true,
            look_away_threshold_ms: default_look_away_threshold_ms(),
            idle_threshold_ms: default_idle_threshold_ms(),
            tab_switch_grace_period_ms: default_tab_switch_grace_period_ms(),
            report_interval_ms: default_report_interval_ms(),
            camera_permission_granted: false,
            gaze_poll_interval_ms: default_gaze_poll_interval_ms(),
            no_face_grace_frames: default_no_face_grace_frames(),
            max_yaw_degrees: default_max_yaw_degrees(),
            max_pitch_degrees: default_max_pitch_degrees(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_look_away_threshold_ms() -> u64 {
    3_000
}

fn default_idle_threshold_ms() -> u64 {
    60_000
}

fn default_tab_switch_grace_period_ms() -> u64 {
    2_000
}

fn default_report_interval_ms() -> u64 {
    30_000
}

fn default_gaze_poll_interval_ms() -> u64 {
    500
}

fn default_no_face_grace_frames() -> u32 {
    4
}

fn default_max_yaw_degrees() -> f32 {
    30.0
}

fn default_max_pitch_degrees() -> f32 {
    25.0
}

/// Backend thresholds arrive in seconds; zero means "not set"
fn seconds_to_ms(seconds: Option<u64>) -> Option<u64> {
    seconds.filter(|&s| s > 0).map(|s| s.saturating_mul(1000))
}

impl AttentionConfig {
    /// Build a session config from backend preferences, keeping local
    /// defaults for anything the backend does not control.
    pub fn from_preferences(prefs: &AttentionPreferences, base: &AttentionConfig) -> Self {
        let enabled = prefs.tracking_enabled;
        Self {
            enable_gaze_tracking: enabled && prefs.gaze_tracking_enabled,
            enable_tab_tracking: enabled && prefs.tab_tracking_enabled,
            enable_idle_tracking: enabled && prefs.idle_tracking_enabled,
            look_away_threshold_ms: seconds_to_ms(prefs.look_away_threshold_seconds)
                .unwrap_or(base.look_away_threshold_ms),
            idle_threshold_ms: seconds_to_ms(prefs.idle_threshold_seconds)
                .unwrap_or(base.idle_threshold_ms),
            camera_permission_granted: base.camera_permission_granted,
            ..base.clone()
        }
    }

    /// Validate thresholds, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.report_interval_ms == 0 {
            return Err(Error::Config(
                "tracking.report_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.idle_threshold_ms == 0 {
            return Err(Error::Config(
                "tracking.idle_threshold_ms must be greater than zero".to_string(),
            ));
        }
        if self.gaze_poll_interval_ms == 0 {
            return Err(Error::Config(
                "tracking.gaze_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=90.0).contains(&self.max_yaw_degrees)
            || !(0.0..=90.0).contains(&self.max_pitch_degrees)
        {
            return Err(Error::Config(
                "tracking head-pose thresholds must be between 0 and 90 degrees".to_string(),
            ));
        }
        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }

    pub fn look_away_threshold(&self) -> Duration {
        Duration::from_millis(self.look_away_threshold_ms)
    }

    pub fn tab_switch_grace_period(&self) -> Duration {
        Duration::from_millis(self.tab_switch_grace_period_ms)
    }

    pub fn gaze_poll_interval(&self) -> Duration {
        Duration::from_millis(self.gaze_poll_interval_ms)
    }
}

/// Metrics backend configuration
///
/// When enabled, metrics reports are posted to the backend. When disabled
/// the tracker still runs and reports are discarded locally.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Enable/disable posting metrics
    #[serde(default)]
    pub enabled: bool,

    /// API base URL (e.g., `https://study.example.com/api`)
    pub server_url: Option<String>,

    /// Bearer token of the signed-in user
    pub api_token: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_sync_timeout")]
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: None,
            api_token: None,
            timeout_secs: default_sync_timeout(),
        }
    }
}

fn default_sync_timeout() -> u64 {
    30
}

impl SyncConfig {
    /// Check if sync is properly configured and enabled
    pub fn is_ready(&self) -> bool {
        self.enabled && self.server_url.is_some()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        match self.server_url.as_deref() {
            None => {
                return Err(Error::Config(
                    "sync.server_url is required when sync is enabled".to_string(),
                ))
            }
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                return Err(Error::Config(format!(
                    "sync.server_url must be an http(s) URL, got {}",
                    url
                )))
            }
            Some(_) => {}
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "sync.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.tracking.validate()?;
        config.sync.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/attentrack/config.toml` (~/.config/attentrack/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("attentrack").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/attentrack/` (~/.local/state/attentrack/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("attentrack")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("attentrack.log")
    }
}
