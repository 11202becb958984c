//! Frame processing loop
//!
//! Pulls frames from the camera, runs the DMS, drives the audio alerts,
//! draws the overlay and fans the encoded frames out to streaming clients.
//! Runs on one blocking thread; it is the only owner of the alert state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alerting::{AlertEvent, AlertManager};
use axum::body::Bytes;
use camera_capture::{mjpeg, FrameSource, VideoFrame};
use dms::{overlay, DmsAnalysis, DmsModule};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::ServerError;

/// Alert events published to the status endpoints
pub const ALERT_HISTORY: usize = 50;

/// Subscription point for encoded frames.
///
/// Holds no sender, so every subscription ends once the pipeline is dropped.
pub struct FrameFeed {
    rx: broadcast::Receiver<Bytes>,
}

impl FrameFeed {
    /// New receiver starting at the next published frame
    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.rx.resubscribe()
    }
}

impl Clone for FrameFeed {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.resubscribe(),
        }
    }
}

/// Receiving ends handed to the HTTP layer
#[derive(Clone)]
pub struct PipelineHandles {
    /// MJPEG parts, one per frame
    pub frames: FrameFeed,
    /// Analysis of the most recent frame
    pub analysis: watch::Receiver<Option<DmsAnalysis>>,
    /// Started alerts, newest first
    pub alerts: watch::Receiver<Vec<AlertEvent>>,
    /// Frames processed so far
    pub frames_processed: watch::Receiver<u64>,
    /// Whether an alert sound is playing
    pub audio_playing: watch::Receiver<bool>,
    /// Set to start a new session before the next frame
    pub session_reset: Arc<AtomicBool>,
}

pub struct FramePipeline {
    source: Box<dyn FrameSource>,
    dms: DmsModule,
    alerts: AlertManager,
    mirror: bool,
    jpeg_quality: u8,
    frames_tx: broadcast::Sender<Bytes>,
    analysis_tx: watch::Sender<Option<DmsAnalysis>>,
    alerts_tx: watch::Sender<Vec<AlertEvent>>,
    processed_tx: watch::Sender<u64>,
    audio_tx: watch::Sender<bool>,
    session_reset: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl FramePipeline {
    pub fn new(
        source: Box<dyn FrameSource>,
        dms: DmsModule,
        alerts: AlertManager,
        mirror: bool,
        jpeg_quality: u8,
        stream_buffer: usize,
    ) -> (Self, PipelineHandles) {
        let (frames_tx, frames_rx) = broadcast::channel(stream_buffer.max(1));
        let (analysis_tx, analysis_rx) = watch::channel(None);
        let (alerts_tx, alerts_rx) = watch::channel(Vec::new());
        let (processed_tx, processed_rx) = watch::channel(0);
        let (audio_tx, audio_rx) = watch::channel(false);
        let session_reset = Arc::new(AtomicBool::new(false));

        let handles = PipelineHandles {
            frames: FrameFeed { rx: frames_rx },
            analysis: analysis_rx,
            alerts: alerts_rx,
            frames_processed: processed_rx,
            audio_playing: audio_rx,
            session_reset: session_reset.clone(),
        };

        let pipeline = Self {
            source,
            dms,
            alerts,
            mirror,
            jpeg_quality,
            frames_tx,
            analysis_tx,
            alerts_tx,
            processed_tx,
            audio_tx,
            session_reset,
            shutdown: Arc::new(AtomicBool::new(false)),
        };
        (pipeline, handles)
    }

    /// Flag that stops `run` before the next frame
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Process one frame. `Ok(None)` at end of stream.
    pub fn step(&mut self) -> Result<Option<DmsAnalysis>, ServerError> {
        if self.session_reset.swap(false, Ordering::AcqRel) {
            self.reset_session();
        }

        let Some(mut frame) = self.source.next_frame()? else {
            return Ok(None);
        };
        if self.mirror {
            frame.mirror();
        }

        let analysis = match self.dms.process(&frame) {
            Ok(analysis) => analysis,
            Err(e) => {
                // A bad frame is treated like a frame without a face
                warn!(sequence = frame.sequence, "Frame analysis failed: {}", e);
                metrics::counter!("dms_frame_errors_total").increment(1);
                DmsAnalysis::no_face(frame.sequence, self.dms.state())
            }
        };

        if self.alerts.handle(analysis.alert(), analysis.sequence).is_some() {
            self.alerts_tx.send_replace(self.alerts.recent(ALERT_HISTORY));
        }
        self.publish_audio();

        let jpeg = self.annotate(frame, &analysis)?;
        // No subscribers is not an error
        let _ = self.frames_tx.send(Bytes::from(mjpeg::part(&jpeg)));

        self.analysis_tx.send_replace(Some(analysis.clone()));
        self.processed_tx.send_modify(|n| *n += 1);
        Ok(Some(analysis))
    }

    /// Clear counters, silence both channels and drop the alert history
    fn reset_session(&mut self) {
        info!("Starting new session");
        self.dms.reset_state();
        self.alerts.clear();
        self.alerts_tx.send_replace(Vec::new());
        self.publish_audio();
    }

    fn publish_audio(&self) {
        let playing = self.alerts.is_sounding();
        self.audio_tx.send_if_modified(|current| {
            let changed = *current != playing;
            *current = playing;
            changed
        });
    }

    fn annotate(&self, frame: VideoFrame, analysis: &DmsAnalysis) -> Result<Vec<u8>, ServerError> {
        let (timestamp_ns, sequence) = (frame.timestamp_ns, frame.sequence);
        let mut image = frame.into_rgb_image()?;
        overlay::draw(&mut image, analysis, self.dms.config());
        let annotated = VideoFrame::from_rgb_image(image, timestamp_ns, sequence);
        Ok(annotated.encode_jpeg(self.jpeg_quality)?)
    }

    /// Run until the source ends or shutdown is requested. Returns frames processed.
    pub fn run(mut self) -> Result<u64, ServerError> {
        info!("Frame pipeline started");
        let mut processed = 0u64;
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.step()? {
                Some(analysis) => {
                    processed += 1;
                    debug!(
                        sequence = analysis.sequence,
                        alert = analysis.alert().as_str(),
                        "Frame done"
                    );
                }
                None => {
                    info!("Camera stream ended after {} frames", processed);
                    break;
                }
            }
        }
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::AlertConfig;
    use camera_capture::{CameraConfig, SyntheticCamera};
    use dms::{mock_face, AlertKind, DmsConfig, ScriptedProvider};

    const W: u32 = 320;
    const H: u32 = 240;

    fn pipeline(
        script: Vec<Option<dms::FaceLandmarks>>,
        frames: u64,
    ) -> (FramePipeline, PipelineHandles) {
        let camera = CameraConfig {
            width: W,
            height: H,
            fps: 0,
            ..Default::default()
        };
        let source = SyntheticCamera::new(&camera).with_limit(frames);
        let provider = Box::new(ScriptedProvider::new(script));
        let dms = DmsModule::with_provider(DmsConfig::default(), provider);
        let alerts = AlertManager::new(AlertConfig {
            drowsy_duration_ms: 60_000,
            ..Default::default()
        });
        FramePipeline::new(Box::new(source), dms, alerts, true, 70, 64)
    }

    fn closed() -> Option<dms::FaceLandmarks> {
        Some(mock_face(0.1, 0.2, W, H))
    }

    #[test]
    fn test_run_publishes_frames_and_alerts() {
        let (pipeline, handles) = pipeline((0..25).map(|_| closed()).collect(), 25);
        let mut frames = handles.frames.subscribe();

        assert_eq!(pipeline.run().unwrap(), 25);

        let alerts = handles.alerts.borrow().clone();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Drowsy);
        assert_eq!(alerts[0].sequence, 19);

        let latest = handles.analysis.borrow().clone().unwrap();
        assert_eq!(latest.sequence, 24);
        assert_eq!(latest.state.drowsy_counter, 25);
        assert_eq!(*handles.frames_processed.borrow(), 25);

        let part = frames.try_recv().unwrap();
        assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8"));
        assert!(part.ends_with(b"\r\n"));
    }

    #[test]
    fn test_faceless_frames_stream_without_alerts() {
        let (mut pipeline, handles) = pipeline(vec![], 3);
        for _ in 0..3 {
            let analysis = pipeline.step().unwrap().unwrap();
            assert!(!analysis.face_detected);
        }
        assert!(pipeline.step().unwrap().is_none());
        assert!(handles.alerts.borrow().is_empty());
    }

    #[test]
    fn test_frame_feed_closes_when_pipeline_ends() {
        let (pipeline, handles) = pipeline(vec![], 2);
        let mut frames = handles.frames.subscribe();
        assert_eq!(pipeline.run().unwrap(), 2);

        assert!(frames.try_recv().is_ok());
        assert!(frames.try_recv().is_ok());
        assert_eq!(
            frames.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        );
        // Late subscribers see the closed channel too
        assert_eq!(
            handles.frames.subscribe().try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        );
    }

    #[test]
    fn test_session_reset_clears_state_and_alerts() {
        let (mut pipeline, handles) = pipeline((0..21).map(|_| closed()).collect(), 21);
        for _ in 0..20 {
            pipeline.step().unwrap();
        }
        assert_eq!(handles.alerts.borrow().len(), 1);
        assert!(*handles.audio_playing.borrow());

        handles.session_reset.store(true, Ordering::SeqCst);
        let analysis = pipeline.step().unwrap().unwrap();
        // Counting restarts from the reset state
        assert_eq!(analysis.state.drowsy_counter, 1);
        assert_eq!(analysis.alert(), AlertKind::None);
        assert!(handles.alerts.borrow().is_empty());
        assert!(!*handles.audio_playing.borrow());
        assert!(!handles.session_reset.load(Ordering::SeqCst));
    }

    #[test]
    fn test_shutdown_flag_stops_run() {
        let (pipeline, handles) = pipeline(vec![], 1_000);
        pipeline.shutdown_flag().store(true, Ordering::SeqCst);
        assert_eq!(pipeline.run().unwrap(), 0);
        assert!(handles.analysis.borrow().is_none());
    }
}
