use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use super::{error_response, DataResponse};
use crate::state::AppState;

// GET /api/v1/health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": uptime,
        "notify_failures": state.dispatcher.failure_count(),
    }))
}

// GET /api/v1/stats
pub async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.stats().await {
        Ok(stats) => Json(DataResponse { data: stats }).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            &format!("Failed to compute stats: {e}"),
        )
        .into_response(),
    }
}
