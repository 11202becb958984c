//! Face mesh landmark detection

use std::path::Path;

use camera_capture::VideoFrame;
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;
use tracing::{debug, error, info};

use crate::landmarks::{FaceLandmarks, LandmarksProvider, Point, MESH_SIZE};
use crate::DmsError;

/// Square input size of the face mesh model
pub const MESH_INPUT_SIZE: u32 = 192;

/// Face mesh model run with tract.
///
/// Input: `1x192x192x3` RGB in [0, 1]. Output 0: `MESH_SIZE * 3` floats
/// (x, y, z in model pixels). Output 1, when present: face presence logit.
pub struct TractLandmarkProvider {
    model: TypedRunnableModel<TypedModel>,
    min_confidence: f32,
}

impl TractLandmarkProvider {
    /// Load and optimize the model at `path`
    pub fn load(path: &Path, min_confidence: f32) -> Result<Self, DmsError> {
        info!("Loading face mesh model from {}", path.display());
        let size = MESH_INPUT_SIZE as usize;

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, size, size, 3]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                error!("Failed to load face mesh model: {}", e);
                DmsError::ModelLoad(e.to_string())
            })?;

        Ok(Self {
            model,
            min_confidence,
        })
    }

    fn input_tensor(frame: &VideoFrame) -> Result<Tensor, DmsError> {
        let view = frame
            .view()
            .ok_or_else(|| {
                DmsError::ImageProcessing("Frame buffer does not match its size".into())
            })?;
        let resized = imageops::resize(
            &view,
            MESH_INPUT_SIZE,
            MESH_INPUT_SIZE,
            FilterType::Triangle,
        );

        let size = MESH_INPUT_SIZE as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok(input.into())
    }
}

impl LandmarksProvider for TractLandmarkProvider {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
        let input = Self::input_tensor(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DmsError::Inference(e.to_string()))?;

        let confidence = match outputs.get(1) {
            Some(score) => {
                let logit = score
                    .to_array_view::<f32>()
                    .map_err(|e| DmsError::Inference(e.to_string()))?
                    .iter()
                    .next()
                    .copied()
                    .unwrap_or(f32::NEG_INFINITY);
                sigmoid(logit)
            }
            None => 1.0,
        };

        if confidence < self.min_confidence {
            debug!(confidence, "Face presence below threshold");
            return Ok(None);
        }

        let coords = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| DmsError::Inference(e.to_string()))?;
        let coords: Vec<f32> = coords.iter().copied().collect();

        Ok(Some(parse_mesh(&coords, confidence)?))
    }
}

/// Convert raw `x, y, z` model output into normalized landmarks
fn parse_mesh(coords: &[f32], confidence: f32) -> Result<FaceLandmarks, DmsError> {
    if coords.len() < MESH_SIZE * 3 {
        return Err(DmsError::Inference(format!(
            "expected {} landmark values, got {}",
            MESH_SIZE * 3,
            coords.len()
        )));
    }

    let scale = MESH_INPUT_SIZE as f32;
    let points = coords
        .chunks_exact(3)
        .take(MESH_SIZE)
        .map(|xyz| Point::new(xyz[0] / scale, xyz[1] / scale))
        .collect();

    Ok(FaceLandmarks::new(points, confidence))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
