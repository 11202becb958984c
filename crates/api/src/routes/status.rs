//! Status Routes

use std::sync::Arc;

use axum::{extract::State, Json};
use dms::DmsAnalysis;
use serde::Serialize;

use crate::AppState;

/// Response for the status endpoint
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Whether at least one frame has been processed
    pub ready: bool,
    pub frames_processed: u64,
    /// Whether an alert sound is playing
    pub audio_playing: bool,
    /// Analysis of the most recent frame
    pub analysis: Option<DmsAnalysis>,
}

/// Latest frame analysis
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let analysis = state.handles.analysis.borrow().clone();
    let frames_processed = *state.handles.frames_processed.borrow();
    let audio_playing = *state.handles.audio_playing.borrow();

    Json(StatusResponse {
        ready: analysis.is_some(),
        frames_processed,
        audio_playing,
        analysis,
    })
}
