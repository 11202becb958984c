//! Driver Monitoring System (DMS)
//!
//! Per-frame driver state analysis from facial landmarks:
//! - Eye aspect ratio (EAR) for eye closure
//! - Mouth aspect ratio (MAR) for yawning
//! - Consecutive-frame alert state machine (drowsy preempts yawn)
//! - Frame annotation for the live view

pub mod analysis;
pub mod config;
pub mod detector;
pub mod landmarks;
pub mod overlay;
pub mod signals;
pub mod state;

pub use analysis::DmsAnalysis;
pub use config::DmsConfig;
pub use detector::TractLandmarkProvider;
pub use landmarks::{
    mock_face, FaceGeometry, FaceLandmarks, LandmarksProvider, MockFaceProvider, NoFaceProvider,
    Point, ScriptedProvider,
};
pub use signals::{compute_ear, compute_mar, FrameSignals};
pub use state::{AlertKind, AlertState};

use camera_capture::frame::VideoFrame;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Landmark {index} missing, model returned {available} points")]
    KeypointsMissing { index: usize, available: usize },
}

/// Driver monitoring module: landmarks in, signals and alert state out
pub struct DmsModule {
    config: DmsConfig,
    provider: Box<dyn LandmarksProvider>,
    state: AlertState,
}

impl DmsModule {
    /// Create a new DMS module, loading the landmark model if one is configured
    pub fn new(config: DmsConfig) -> Result<Self, DmsError> {
        config.validate()?;
        let provider: Box<dyn LandmarksProvider> = match &config.landmark_model_path {
            Some(path) => Box::new(TractLandmarkProvider::load(
                Path::new(path),
                config.min_face_confidence,
            )?),
            None if config.mock_landmarks => {
                warn!("No landmark model path configured. Using mock face.");
                Box::new(MockFaceProvider::new())
            }
            None => {
                warn!("No landmark model path configured. Every frame will report no face.");
                Box::new(NoFaceProvider)
            }
        };
        Ok(Self::with_provider(config, provider))
    }

    /// Create a DMS module around an existing landmark provider
    pub fn with_provider(config: DmsConfig, provider: Box<dyn LandmarksProvider>) -> Self {
        info!(
            ear_threshold = config.ear_threshold,
            ear_consec_frames = config.ear_consec_frames,
            mar_threshold = config.mar_threshold,
            mar_consec_frames = config.mar_consec_frames,
            "DMS module ready"
        );
        Self {
            config,
            provider,
            state: AlertState::default(),
        }
    }

    /// Analyze a single frame.
    ///
    /// Frames without a face leave the alert state untouched.
    pub fn process(&mut self, frame: &VideoFrame) -> Result<DmsAnalysis, DmsError> {
        metrics::counter!("dms_frames_total").increment(1);

        let Some(landmarks) = self.provider.detect(frame)? else {
            metrics::counter!("dms_frames_without_face_total").increment(1);
            debug!(sequence = frame.sequence, "No face detected");
            return Ok(DmsAnalysis::no_face(frame.sequence, self.state));
        };

        let geometry = FaceGeometry::from_landmarks(&landmarks, frame.width, frame.height)?;
        let signals = FrameSignals::from_geometry(&geometry);
        self.update(&signals);

        metrics::gauge!("dms_ear").set(signals.avg_ear as f64);
        metrics::gauge!("dms_mar").set(signals.mar as f64);

        Ok(DmsAnalysis {
            sequence: frame.sequence,
            face_detected: true,
            signals: Some(signals),
            geometry: Some(geometry),
            state: self.state,
        })
    }

    /// Advance the alert state with precomputed signals
    pub fn update(&mut self, signals: &FrameSignals) -> AlertState {
        let previous = self.state.current_alert;
        self.state = self.state.step(signals, &self.config);

        debug!(
            avg_ear = signals.avg_ear,
            mar = signals.mar,
            drowsy_counter = self.state.drowsy_counter,
            yawn_counter = self.state.yawn_counter,
            "Frame signals"
        );
        if previous != self.state.current_alert {
            info!(
                "Alert state changed: {} -> {}",
                previous.as_str(),
                self.state.current_alert.as_str()
            );
        }
        self.state
    }

    /// Current alert state
    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Reset alert state (new session)
    pub fn reset_state(&mut self) {
        self.state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: u32 = 1024;
    const HEIGHT: u32 = 512;

    fn frame(sequence: u64) -> VideoFrame {
        VideoFrame::new(vec![0; (WIDTH * HEIGHT * 3) as usize], WIDTH, HEIGHT, 0, sequence).unwrap()
    }

    /// Normalized face mesh with eye openness `eye_h` and mouth opening `mouth_h` (pixels)
    fn face(eye_h: f32, mouth_h: f32) -> FaceLandmarks {
        let mut points = vec![Point::new(0.5, 0.5); 468];
        let mut put = |idx: usize, x: f32, y: f32| {
            points[idx] = Point::new(x / WIDTH as f32, y / HEIGHT as f32);
        };
        for (eye, cx) in [(landmarks::LEFT_EYE, 250.0), (landmarks::RIGHT_EYE, 390.0)] {
            // 40px wide eye
            put(eye[0], cx - 20.0, 200.0);
            put(eye[1], cx - 7.0, 200.0 - eye_h / 2.0);
            put(eye[2], cx + 7.0, 200.0 - eye_h / 2.0);
            put(eye[3], cx + 20.0, 200.0);
            put(eye[4], cx + 7.0, 200.0 + eye_h / 2.0);
            put(eye[5], cx - 7.0, 200.0 + eye_h / 2.0);
        }
        // 60px wide mouth
        put(landmarks::MOUTH[0], 320.0, 320.0);
        put(landmarks::MOUTH[1], 320.0, 320.0 + mouth_h);
        put(landmarks::MOUTH[2], 290.0, 330.0);
        put(landmarks::MOUTH[3], 350.0, 330.0);
        FaceLandmarks::new(points, 0.9)
    }

    // EAR = eye_h / 40, MAR = mouth_h / 60
    fn open_face() -> Option<FaceLandmarks> {
        Some(face(14.0, 10.0))
    }

    fn closed_face() -> Option<FaceLandmarks> {
        Some(face(4.0, 10.0))
    }

    fn module(script: Vec<Option<FaceLandmarks>>) -> DmsModule {
        DmsModule::with_provider(DmsConfig::default(), Box::new(ScriptedProvider::new(script)))
    }

    #[test]
    fn test_signals_from_frame() {
        let mut dms = module(vec![Some(face(12.0, 48.0))]);
        let analysis = dms.process(&frame(0)).unwrap();
        assert!(analysis.face_detected);
        let signals = analysis.signals.unwrap();
        assert!((signals.avg_ear - 0.3).abs() < 0.03);
        assert!((signals.mar - 0.8).abs() < 0.03);
        assert_eq!(analysis.geometry.unwrap().left_eye[0], Point::new(230.0, 200.0));
    }

    #[test]
    fn test_missing_face_holds_counters() {
        // Frames 0..=9 closed, frame 10 missing, frame 11 closed
        let mut script: Vec<_> = (0..10).map(|_| closed_face()).collect();
        script.push(None);
        script.push(closed_face());
        let mut dms = module(script);

        let mut counters = Vec::new();
        for seq in 0..12 {
            let analysis = dms.process(&frame(seq)).unwrap();
            counters.push(analysis.state.drowsy_counter);
            if seq == 10 {
                assert!(!analysis.face_detected);
                assert!(analysis.signals.is_none());
            }
        }
        assert_eq!(counters[9], 10);
        assert_eq!(counters[10], counters[9]);
        assert_eq!(counters[11], counters[9] + 1);
    }

    #[test]
    fn test_missing_face_does_not_reset_alert() {
        let mut script: Vec<_> = (0..20).map(|_| closed_face()).collect();
        script.extend((0..5).map(|_| None));
        script.push(closed_face());
        let mut dms = module(script);

        let mut last = DmsAnalysis::default();
        for seq in 0..26 {
            last = dms.process(&frame(seq)).unwrap();
        }
        assert_eq!(last.state.drowsy_counter, 21);
        assert_eq!(last.alert(), AlertKind::Drowsy);
    }

    #[test]
    fn test_drowsy_then_recovery() {
        let mut script: Vec<_> = (0..20).map(|_| closed_face()).collect();
        script.push(open_face());
        let mut dms = module(script);

        for seq in 0..20 {
            dms.process(&frame(seq)).unwrap();
        }
        assert_eq!(dms.state().current_alert, AlertKind::Drowsy);

        let analysis = dms.process(&frame(20)).unwrap();
        assert_eq!(analysis.state.drowsy_counter, 0);
        assert_eq!(analysis.alert(), AlertKind::None);
    }

    #[test]
    fn test_yawn_detection() {
        let script: Vec<_> = (0..15).map(|_| Some(face(14.0, 54.0))).collect();
        let mut dms = module(script);
        let mut alerts = Vec::new();
        for seq in 0..15 {
            alerts.push(dms.process(&frame(seq)).unwrap().alert());
        }
        assert_eq!(alerts[13], AlertKind::None);
        assert_eq!(alerts[14], AlertKind::Yawn);
    }

    #[test]
    fn test_no_model_reports_no_face() {
        let mut dms = DmsModule::new(DmsConfig::default()).unwrap();
        let analysis = dms.process(&frame(0)).unwrap();
        assert!(!analysis.face_detected);
        assert_eq!(dms.state(), AlertState::default());
    }

    #[test]
    fn test_mock_landmarks_drive_alerts() {
        let config = DmsConfig {
            mock_landmarks: true,
            ..Default::default()
        };
        let mut dms = DmsModule::new(config).unwrap();
        let mut alerts = Vec::new();
        for seq in 0..220 {
            alerts.push(dms.process(&frame(seq)).unwrap().alert());
        }
        // Eyes close at frame 90, drowsy after 20 closed frames
        assert_eq!(alerts[108], AlertKind::None);
        assert_eq!(alerts[109], AlertKind::Drowsy);
        assert_eq!(alerts[130], AlertKind::None);
        // Yawning from frame 190, alert after 15 frames
        assert_eq!(alerts[203], AlertKind::None);
        assert_eq!(alerts[204], AlertKind::Yawn);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DmsConfig {
            ear_consec_frames: 0,
            ..Default::default()
        };
        assert!(matches!(DmsModule::new(config), Err(DmsError::Config(_))));
    }

    #[test]
    fn test_update_and_reset() {
        let mut dms = module(vec![]);
        let closed = FrameSignals {
            left_ear: 0.1,
            right_ear: 0.1,
            avg_ear: 0.1,
            mar: 0.2,
        };
        for _ in 0..20 {
            dms.update(&closed);
        }
        assert_eq!(dms.state().current_alert, AlertKind::Drowsy);
        dms.reset_state();
        assert_eq!(dms.state(), AlertState::default());
    }
}
