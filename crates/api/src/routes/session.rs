//! Session Routes

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::info;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
}

/// Start a new driving session: counters, sounds and alert history are
/// cleared before the next frame is analyzed.
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ResetResponse>) {
    info!("Session reset requested");
    state.handles.session_reset.store(true, Ordering::Release);
    (
        StatusCode::ACCEPTED,
        Json(ResetResponse {
            status: "reset_requested",
        }),
    )
}
