//! Error types for attentrack-core

use thiserror::Error;

/// Main error type for the attentrack-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Face-landmark model failed to load or run
    #[error("model error: {0}")]
    Model(String),

    /// Metrics backend/API error
    #[error("sync error: {0}")]
    Sync(String),

    /// Operation not allowed in the tracker's current lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Failures reported by a [`Camera`](crate::detectors::gaze::Camera) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The user or platform refused camera access
    #[error("camera permission denied")]
    PermissionDenied,

    /// No capture device is present
    #[error("no camera found")]
    NotFound,

    /// Another application holds the device
    #[error("camera already in use")]
    InUse,

    /// The host has no camera API at all
    #[error("camera capture unsupported")]
    Unsupported,

    /// The stream failed after it was opened
    #[error("camera stream failed: {0}")]
    Stream(String),
}

/// Result type alias for attentrack-core
pub type Result<T> = std::result::Result<T, Error>;
