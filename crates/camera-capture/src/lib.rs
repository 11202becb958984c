//! Camera Capture Library for the Drowsiness Monitor
//!
//! Provides pull-based frame sources and the frame plumbing around them.
//! Supports:
//! - Synthetic test-pattern camera (no hardware required)
//! - Image directory replay (recorded sessions, fixtures)
//! - Horizontal mirroring and JPEG encoding
//! - MJPEG multipart framing for browser streaming

pub mod frame;
pub mod mjpeg;
pub mod source;

pub use frame::VideoFrame;
pub use source::{open_source, FrameSource, ImageDirSource, SyntheticCamera};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera source: {0}")]
    Open(String),

    #[error("Invalid frame format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraSource {
    /// Generated test pattern
    Synthetic,
    /// Replay of image files from a directory, in file name order
    Directory {
        path: PathBuf,
        #[serde(default = "default_true")]
        looped: bool,
    },
}

fn default_true() -> bool {
    true
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Frame source
    pub source: CameraSource,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS (0 disables pacing)
    pub fps: u32,
    /// Mirror frames horizontally before analysis (selfie view)
    pub mirror: bool,
    /// JPEG quality for the outgoing stream (1-100)
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraSource::Synthetic,
            width: 640,
            height: 480,
            fps: 15,
            mirror: true,
            jpeg_quality: 80,
        }
    }
}

impl CameraConfig {
    /// Frame interval implied by `fps`, if pacing is enabled
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        if self.fps == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs_f64(1.0 / self.fps as f64))
        }
    }
}
