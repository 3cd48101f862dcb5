//! Camera and face-landmark model boundary
//!
//! The host supplies implementations of these traits when it builds a
//! [`GazeDetector`](super::GazeDetector). Frames and landmarks never leave the
//! process.

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{CameraError, Result};

/// Requested capture format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
    /// Prefer the user-facing camera
    pub front_facing: bool,
}

impl Default for CameraConstraints {
    /// Low resolution is enough for coarse head pose
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            front_facing: true,
        }
    }
}

/// One captured video frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Packed RGBA pixels
    pub pixels: Vec<u8>,
    pub captured_at: Instant,
}

/// A 2D landmark in normalized image coordinates (0.0..=1.0, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The landmarks head pose is derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceLandmarks {
    pub nose_tip: Point,
    pub left_ear: Point,
    pub right_ear: Point,
    pub chin: Point,
}

/// Source of camera streams
#[async_trait]
pub trait Camera: Send + Sync {
    /// Ask for access and open a stream
    async fn open(&self, constraints: CameraConstraints)
        -> std::result::Result<Box<dyn CameraStream>, CameraError>;
}

/// An open camera stream
#[async_trait]
pub trait CameraStream: Send {
    /// Next frame; `Ok(None)` when the stream has ended
    async fn next_frame(&mut self) -> std::result::Result<Option<Frame>, CameraError>;

    /// Number of tracks still capturing
    fn live_tracks(&self) -> usize;

    /// Stop every track. Must be idempotent.
    fn stop_tracks(&mut self);
}

/// Loads the face-landmark model
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Box<dyn LandmarkModel>>;
}

/// A loaded face-landmark model
#[async_trait]
pub trait LandmarkModel: Send {
    /// Landmarks of the most prominent face, or `None` when no face is visible
    async fn detect(&mut self, frame: &Frame) -> Result<Option<FaceLandmarks>>;
}
