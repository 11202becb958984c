//! Alert Routes

use axum::{
    extract::{Query, State},
    Json,
};
use alerting::AlertEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;

/// Query parameters for alerts endpoint
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Filter by alert kind ("drowsy" or "yawn")
    pub kind: Option<String>,
    /// Maximum number of records
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// Response for alerts endpoint
#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub data: Vec<AlertEvent>,
    pub count: usize,
}

/// Recently started alerts, newest first
pub async fn get_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlertQuery>,
) -> Json<AlertResponse> {
    let data: Vec<AlertEvent> = state
        .handles
        .alerts
        .borrow()
        .iter()
        .filter(|event| {
            params
                .kind
                .as_deref()
                .map_or(true, |kind| event.kind.as_str() == kind)
        })
        .take(params.limit)
        .cloned()
        .collect();

    Json(AlertResponse {
        count: data.len(),
        data,
    })
}
