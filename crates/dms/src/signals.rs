//! Eye and mouth aspect ratios

use serde::{Deserialize, Serialize};

use crate::landmarks::{FaceGeometry, Point};

/// Eye aspect ratio from six eye points.
///
/// Points are ordered P0..P5 with P0/P3 the horizontal corners and P1/P5,
/// P2/P4 the vertical lid pairs:
/// `(|P1-P5| + |P2-P4|) / (2 * |P0-P3|)`.
pub fn compute_ear(eye: &[Point; 6]) -> f32 {
    let a = eye[1].distance(&eye[5]);
    let b = eye[2].distance(&eye[4]);
    let c = eye[0].distance(&eye[3]);
    (a + b) / (2.0 * c)
}

/// Mouth aspect ratio: vertical opening `|A0-A1|` over width `|A2-A3|`.
///
/// Returns 0 when the corners coincide.
pub fn compute_mar(mouth: &[Point; 4]) -> f32 {
    let vertical = mouth[0].distance(&mouth[1]);
    let horizontal = mouth[2].distance(&mouth[3]);
    if horizontal == 0.0 {
        return 0.0;
    }
    vertical / horizontal
}

/// Per-frame signals derived from the face geometry
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameSignals {
    pub left_ear: f32,
    pub right_ear: f32,
    /// Mean of both eyes, smooths asymmetric blinks and detection noise
    pub avg_ear: f32,
    pub mar: f32,
}

impl FrameSignals {
    pub fn from_geometry(geometry: &FaceGeometry) -> Self {
        let left_ear = compute_ear(&geometry.left_eye);
        let right_ear = compute_ear(&geometry.right_eye);
        Self {
            left_ear,
            right_ear,
            avg_ear: (left_ear + right_ear) / 2.0,
            mar: compute_mar(&geometry.mouth),
        }
    }
}
