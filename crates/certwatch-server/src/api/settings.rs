use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use certwatch_common::types::NotificationSettings;
use certwatch_notify::template;
use serde::Deserialize;

use super::{error_response, DataResponse};
use crate::state::AppState;

fn validate_templates(settings: &NotificationSettings) -> Result<(), String> {
    let candidates = [
        ("webhook_template", &settings.webhook_template),
        ("telegram_template", &settings.telegram_template),
        ("status_alert", &settings.events.status_alert.template),
        ("domain_added", &settings.events.domain_added.template),
        ("domain_removed", &settings.events.domain_removed.template),
        ("renew_result", &settings.events.renew_result.template),
    ];
    for (name, tpl) in candidates {
        if !tpl.is_empty() {
            template::validate(tpl).map_err(|e| format!("{name}: {e}"))?;
        }
    }
    Ok(())
}

// GET /api/v1/settings
pub async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_settings().await {
        Ok(settings) => Json(DataResponse { data: settings }).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            &format!("Storage error: {e}"),
        )
        .into_response(),
    }
}

// POST /api/v1/settings
pub async fn save_settings(
    State(state): State<AppState>,
    Json(settings): Json<NotificationSettings>,
) -> impl IntoResponse {
    if let Err(msg) = validate_templates(&settings) {
        return error_response(StatusCode::BAD_REQUEST, "invalid_template", &msg).into_response();
    }
    match state.store.save_settings(&settings).await {
        Ok(()) => Json(settings).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            &format!("Failed to save settings: {e}"),
        )
        .into_response(),
    }
}

// POST /api/v1/settings/test
//
// Delivers a test message through the candidate settings without
// persisting them.
pub async fn test_settings(
    State(state): State<AppState>,
    Json(settings): Json<NotificationSettings>,
) -> impl IntoResponse {
    if let Err(msg) = validate_templates(&settings) {
        return error_response(StatusCode::BAD_REQUEST, "invalid_template", &msg).into_response();
    }
    match state.dispatcher.send_test(&settings).await {
        Ok(delivered) => Json(serde_json::json!({ "delivered": delivered })).into_response(),
        Err(e @ certwatch_notify::NotifyError::InvalidConfig(_)) => {
            error_response(StatusCode::BAD_REQUEST, "invalid_config", &e.to_string())
                .into_response()
        }
        Err(e) => error_response(StatusCode::BAD_GATEWAY, "delivery_failed", &e.to_string())
            .into_response(),
    }
}

#[derive(Deserialize)]
pub struct AcmeRequest {
    pub email: String,
}

// POST /api/v1/settings/acme
pub async fn set_acme_email(
    State(state): State<AppState>,
    Json(req): Json<AcmeRequest>,
) -> impl IntoResponse {
    if req.email.is_empty() || !req.email.contains('@') {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_email",
            "A valid email address is required",
        )
        .into_response();
    }
    match state.store.set_acme_email(&req.email).await {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            &format!("Failed to save ACME email: {e}"),
        )
        .into_response(),
    }
}
