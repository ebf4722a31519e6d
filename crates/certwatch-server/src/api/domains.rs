use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use certwatch_common::types::{EventKind, NotificationEvent};
use certwatch_notify::EventSink;
use certwatch_storage::DomainQuery;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use super::{error_response, DataResponse, ListResponse};
use crate::renew::Renewer as _;
use crate::state::AppState;

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    10
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_limit")]
    limit: u64,
    #[serde(default)]
    sort: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    proxied: String,
    #[serde(default)]
    ignored: String,
    #[serde(default)]
    zone: String,
}

// GET /api/v1/domains
pub async fn list_domains(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let q = DomainQuery {
        page: params.page,
        limit: params.limit.clamp(1, 200),
        sort: params.sort,
        status: params.status,
        proxied: params.proxied,
        ignored: params.ignored,
        zone: params.zone,
    };
    match state.store.query(&q).await {
        Ok((data, total)) => Json(ListResponse {
            data,
            total,
            page: q.page,
            limit: q.limit,
        })
        .into_response(),
        Err(e) => error_response(
            StatusCode::BAD_REQUEST,
            "invalid_query",
            &format!("{e}"),
        )
        .into_response(),
    }
}

// GET /api/v1/zones
pub async fn list_zones(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.distinct_zones().await {
        Ok(zones) => Json(DataResponse { data: zones }).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            &format!("Failed to list zones: {e}"),
        )
        .into_response(),
    }
}

// POST /api/v1/domains/sync
//
// Kicks off a provider sync in the background; progress is observed by
// re-polling /domains. Provider errors abort the sync without deletions
// and are logged, never surfaced here.
pub async fn sync_domains(State(state): State<AppState>) -> impl IntoResponse {
    let reconciler = state.reconciler.clone();
    let provider = state.provider.clone();
    tokio::spawn(async move {
        if let Err(e) = reconciler.sync(provider.as_ref()).await {
            tracing::error!(error = %e, "provider sync failed");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true })),
    )
        .into_response()
}

#[derive(Serialize)]
struct ScanStarted {
    scanning: usize,
}

// POST /api/v1/domains/scan
//
// Kicks off a full probe pass in the background and reports how many
// domains were queued.
pub async fn scan_domains(State(state): State<AppState>) -> impl IntoResponse {
    let domains = match state.store.list_scannable().await {
        Ok(domains) => domains,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                &format!("Failed to list domains: {e}"),
            )
            .into_response()
        }
    };

    let queued = domains.len();
    let reconciler = state.reconciler.clone();
    let prober = state.prober.clone();
    let warning_days = state.config.scan.warning_days;
    let max_concurrent = state.config.scan.max_concurrent;

    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let mut handles = Vec::with_capacity(queued);
        for record in domains {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let reconciler = reconciler.clone();
            let prober = prober.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = reconciler
                    .scan_domain(prober.as_ref(), &record, warning_days)
                    .await
                {
                    tracing::error!(domain = %record.domain_name, error = %e, "domain scan failed");
                }
                drop(permit);
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!(count = queued, "manual scan finished");
    });

    (StatusCode::ACCEPTED, Json(ScanStarted { scanning: queued })).into_response()
}

#[derive(Deserialize)]
pub struct DomainSettingsRequest {
    pub is_ignored: bool,
}

// PATCH /api/v1/domains/:id/settings
pub async fn update_domain_settings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DomainSettingsRequest>,
) -> impl IntoResponse {
    match state.store.set_ignored(&id, req.is_ignored).await {
        Ok(true) => match state.store.get_by_id(&id).await {
            Ok(Some(record)) => Json(record).into_response(),
            Ok(None) => error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                &format!("Domain '{id}' not found"),
            )
            .into_response(),
            Err(e) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                &format!("Storage error: {e}"),
            )
            .into_response(),
        },
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            &format!("Domain '{id}' not found"),
        )
        .into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            &format!("Storage error: {e}"),
        )
        .into_response(),
    }
}

#[derive(Deserialize)]
pub struct BatchSettingsRequest {
    pub ids: Vec<String>,
    pub is_ignored: bool,
}

// PATCH /api/v1/domains/settings/batch
pub async fn batch_update_settings(
    State(state): State<AppState>,
    Json(req): Json<BatchSettingsRequest>,
) -> impl IntoResponse {
    if req.ids.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "empty_batch",
            "Ids list cannot be empty",
        )
        .into_response();
    }
    match state.store.batch_set_ignored(&req.ids, req.is_ignored).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            &format!("Batch update failed: {e}"),
        )
        .into_response(),
    }
}

#[derive(Deserialize)]
pub struct RenewRequest {
    pub domain: String,
}

// POST /api/v1/domains/renew
pub async fn renew_domain(
    State(state): State<AppState>,
    Json(req): Json<RenewRequest>,
) -> impl IntoResponse {
    if req.domain.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_domain",
            "Domain cannot be empty",
        )
        .into_response();
    }

    let settings = match state.store.get_settings().await {
        Ok(settings) => settings,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                &format!("Storage error: {e}"),
            )
            .into_response()
        }
    };
    if settings.acme_email.is_empty() {
        return error_response(
            StatusCode::PRECONDITION_FAILED,
            "acme_not_configured",
            "Set an ACME account email before requesting renewal",
        )
        .into_response();
    }

    let record = match state.store.get_by_name(&req.domain).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                &format!("Domain '{}' not found", req.domain),
            )
            .into_response()
        }
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                &format!("Storage error: {e}"),
            )
            .into_response()
        }
    };

    // fire and forget: the outcome surfaces as a renew_result event and,
    // on success, as refreshed record state after the follow-up scan
    let renewer = state.renewer.clone();
    let sink = state.sink.clone();
    let reconciler = state.reconciler.clone();
    let prober = state.prober.clone();
    let warning_days = state.config.scan.warning_days;
    tokio::spawn(async move {
        let outcome = match renewer.renew(&record.domain_name, &settings.acme_email).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(domain = %record.domain_name, error = %e, "renewal could not start");
                sink.submit(
                    NotificationEvent::new(EventKind::RenewResult, &record.domain_name)
                        .with_var("Result", "failed")
                        .with_var("Detail", e.to_string()),
                );
                return;
            }
        };

        sink.submit(
            NotificationEvent::new(EventKind::RenewResult, &record.domain_name)
                .with_var("Result", if outcome.success { "succeeded" } else { "failed" })
                .with_var("Detail", outcome.detail),
        );

        if outcome.success {
            if let Err(e) = reconciler
                .scan_domain(prober.as_ref(), &record, warning_days)
                .await
            {
                tracing::error!(domain = %record.domain_name, error = %e, "post-renewal scan failed");
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true, "domain": req.domain })),
    )
        .into_response()
}
