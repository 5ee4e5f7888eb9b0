pub mod upload;
pub mod videos;

use crate::models::{iso_timestamp, HealthResponse};
use crate::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

pub async fn root(State(state): State<Arc<AppState>>) -> String {
    state.config.running_message()
}

/// Liveness only; never touches the uploads directory.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: state.config.running_message(),
        timestamp: iso_timestamp(Utc::now()),
    })
}
