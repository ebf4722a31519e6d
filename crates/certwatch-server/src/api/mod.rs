pub mod domains;
pub mod settings;
pub mod stats;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct ApiError {
    error: String,
    code: String,
}

pub(crate) fn error_response(status: StatusCode, code: &str, msg: &str) -> impl IntoResponse {
    (
        status,
        Json(ApiError {
            error: msg.to_string(),
            code: code.to_string(),
        }),
    )
}

/// Envelope for unpaginated collection responses.
#[derive(Serialize)]
pub(crate) struct DataResponse<T> {
    pub data: T,
}

/// Envelope for paginated listings.
#[derive(Serialize)]
pub(crate) struct ListResponse<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(stats::health))
        .route("/stats", get(stats::dashboard))
        .route("/zones", get(domains::list_zones))
        .route("/domains", get(domains::list_domains))
        .route("/domains/sync", post(domains::sync_domains))
        .route("/domains/scan", post(domains::scan_domains))
        .route("/domains/renew", post(domains::renew_domain))
        .route("/domains/settings/batch", patch(domains::batch_update_settings))
        .route("/domains/:id/settings", patch(domains::update_domain_settings))
        .route("/settings", get(settings::get_settings).post(settings::save_settings))
        .route("/settings/test", post(settings::test_settings))
        .route("/settings/acme", post(settings::set_acme_email))
}
