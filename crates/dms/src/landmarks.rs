//! Facial landmarks and the subsets used for eye/mouth geometry

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Face mesh indices of the left eye: outer corner, upper lid x2, inner corner, lower lid x2
pub const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];

/// Face mesh indices of the right eye, same anatomical order as [`LEFT_EYE`]
pub const RIGHT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];

/// Upper lip, lower lip, left corner, right corner
pub const MOUTH: [usize; 4] = [13, 14, 78, 308];

/// Inner lip contour, drawn as a closed polyline
pub const INNER_LIPS: [usize; 20] = [
    78, 191, 80, 81, 82, 13, 312, 311, 310, 415, 308, 324, 318, 402, 317, 14, 87, 178, 88, 95,
];

/// 2D point (normalized or pixel space depending on context)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Landmarks for one detected face, normalized to [0, 1] of the frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub points: Vec<Point>,
    /// Face presence confidence reported by the model (0-1)
    pub confidence: f32,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Point>, confidence: f32) -> Self {
        Self { points, confidence }
    }
}

/// Pixel-space landmark subsets for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceGeometry {
    pub left_eye: [Point; 6],
    pub right_eye: [Point; 6],
    pub mouth: [Point; 4],
    pub inner_lips: [Point; 20],
}

impl FaceGeometry {
    /// Scale normalized landmarks to whole pixels and pick out the eye/mouth subsets
    pub fn from_landmarks(
        landmarks: &FaceLandmarks,
        width: u32,
        height: u32,
    ) -> Result<Self, DmsError> {
        let to_pixels = |idx: usize| -> Result<Point, DmsError> {
            let p = landmarks
                .points
                .get(idx)
                .ok_or(DmsError::KeypointsMissing {
                    index: idx,
                    available: landmarks.points.len(),
                })?;
            Ok(Point::new(
                (p.x * width as f32).trunc(),
                (p.y * height as f32).trunc(),
            ))
        };

        Ok(Self {
            left_eye: select(&LEFT_EYE, to_pixels)?,
            right_eye: select(&RIGHT_EYE, to_pixels)?,
            mouth: select(&MOUTH, to_pixels)?,
            inner_lips: select(&INNER_LIPS, to_pixels)?,
        })
    }
}

fn select<const N: usize>(
    indices: &[usize; N],
    mut f: impl FnMut(usize) -> Result<Point, DmsError>,
) -> Result<[Point; N], DmsError> {
    let mut out = [Point::default(); N];
    for (slot, &idx) in out.iter_mut().zip(indices) {
        *slot = f(idx)?;
    }
    Ok(out)
}

/// Source of facial landmarks, one face at most per frame
pub trait LandmarksProvider: Send {
    /// Detect a face in `frame`; `Ok(None)` when no face is visible
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError>;
}

/// Provider used when no landmark model is configured
#[derive(Debug, Default)]
pub struct NoFaceProvider;

impl LandmarksProvider for NoFaceProvider {
    fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
        Ok(None)
    }
}

/// Replays a fixed sequence of detections, one per frame
///
/// Useful for recorded landmark tracks and for driving the pipeline in tests.
/// Once the sequence is exhausted every further frame reports no face.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    script: std::collections::VecDeque<Option<FaceLandmarks>>,
}

impl ScriptedProvider {
    pub fn new(script: impl IntoIterator<Item = Option<FaceLandmarks>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl LandmarksProvider for ScriptedProvider {
    fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
        Ok(self.script.pop_front().flatten())
    }
}

/// Points in the base face mesh
pub const MESH_SIZE: usize = 468;

/// Build a face mesh whose eyes and mouth measure `ear` and `mar` on a
/// `width` x `height` frame (up to whole-pixel rounding)
pub fn mock_face(ear: f32, mar: f32, width: u32, height: u32) -> FaceLandmarks {
    let (w, h) = (width as f32, height as f32);
    let mut points = vec![Point::new(0.5, 0.5); MESH_SIZE];
    let mut put = |idx: usize, x: f32, y: f32| points[idx] = Point::new(x / w, y / h);

    let eye_w = w * 0.08;
    let lid = ear * eye_w / 2.0;
    for (eye, cx) in [(LEFT_EYE, 0.4 * w), (RIGHT_EYE, 0.6 * w)] {
        let cy = 0.4 * h;
        put(eye[0], cx - eye_w / 2.0, cy);
        put(eye[1], cx - eye_w / 6.0, cy - lid);
        put(eye[2], cx + eye_w / 6.0, cy - lid);
        put(eye[3], cx + eye_w / 2.0, cy);
        put(eye[4], cx + eye_w / 6.0, cy + lid);
        put(eye[5], cx - eye_w / 6.0, cy + lid);
    }

    let (cx, cy) = (0.5 * w, 0.7 * h);
    let rx = w * 0.06;
    let ry = mar * rx;
    // Inner lips run left corner, top, right corner, bottom
    for (k, &idx) in INNER_LIPS.iter().enumerate() {
        let theta = std::f32::consts::PI * (1.0 - k as f32 / 10.0);
        put(idx, cx + rx * theta.cos(), cy - ry * theta.sin());
    }
    put(MOUTH[0], cx, cy - ry);
    put(MOUTH[1], cx, cy + ry);
    put(MOUTH[2], cx - rx, cy);
    put(MOUTH[3], cx + rx, cy);

    FaceLandmarks::new(points, 1.0)
}

/// Stand-in for a landmark model: a face that looks ahead, dozes off,
/// recovers and then yawns, on a loop
#[derive(Debug, Default)]
pub struct MockFaceProvider {
    frame: u64,
}

impl MockFaceProvider {
    /// (frames, ear, mar) per phase
    const PHASES: [(u64, f32, f32); 4] = [
        (90, 0.32, 0.2),
        (40, 0.12, 0.2),
        (60, 0.32, 0.2),
        (30, 0.32, 0.9),
    ];

    pub fn new() -> Self {
        Self::default()
    }

    fn phase(&self) -> (f32, f32) {
        let cycle: u64 = Self::PHASES.iter().map(|p| p.0).sum();
        let mut at = self.frame % cycle;
        for (frames, ear, mar) in Self::PHASES {
            if at < frames {
                return (ear, mar);
            }
            at -= frames;
        }
        (Self::PHASES[0].1, Self::PHASES[0].2)
    }
}

impl LandmarksProvider for MockFaceProvider {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
        let (ear, mar) = self.phase();
        self.frame += 1;
        Ok(Some(mock_face(ear, mar, frame.width, frame.height)))
    }
}
