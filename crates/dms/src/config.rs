//! DMS configuration

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Average EAR below which the eyes count as closed
    pub ear_threshold: f32,

    /// Consecutive closed-eye frames before the drowsy alert
    pub ear_consec_frames: u32,

    /// MAR above which the mouth counts as yawning
    pub mar_threshold: f32,

    /// Consecutive yawning frames before the yawn alert
    pub mar_consec_frames: u32,

    /// Face presence confidence below which a detection is discarded
    pub min_face_confidence: f32,

    /// Face mesh ONNX model path
    pub landmark_model_path: Option<String>,

    /// Use the built-in mock face instead of a model (demo mode)
    pub mock_landmarks: bool,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.25,
            ear_consec_frames: 20,
            mar_threshold: 0.7,
            mar_consec_frames: 15,
            min_face_confidence: 0.5,
            landmark_model_path: None,
            mock_landmarks: false,
        }
    }
}

impl DmsConfig {
    /// Create strict config (fewer frames before alerting)
    pub fn strict() -> Self {
        Self {
            ear_consec_frames: 12,
            mar_consec_frames: 10,
            ..Default::default()
        }
    }

    /// Create lenient config (more frames before alerting)
    pub fn lenient() -> Self {
        Self {
            ear_consec_frames: 30,
            mar_consec_frames: 25,
            ..Default::default()
        }
    }

    /// Reject values that would make every frame (or no frame) alert
    pub fn validate(&self) -> Result<(), DmsError> {
        if !(self.ear_threshold > 0.0 && self.ear_threshold.is_finite()) {
            return Err(DmsError::Config(format!(
                "ear_threshold must be positive, got {}",
                self.ear_threshold
            )));
        }
        if !(self.mar_threshold > 0.0 && self.mar_threshold.is_finite()) {
            return Err(DmsError::Config(format!(
                "mar_threshold must be positive, got {}",
                self.mar_threshold
            )));
        }
        if self.ear_consec_frames == 0 || self.mar_consec_frames == 0 {
            return Err(DmsError::Config(
                "consecutive frame counts must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_face_confidence) {
            return Err(DmsError::Config(format!(
                "min_face_confidence must be within 0..=1, got {}",
                self.min_face_confidence
            )));
        }
        Ok(())
    }
}
