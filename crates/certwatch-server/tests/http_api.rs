mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration, Utc};
use common::{healthy_measurement, provider_domain, settle, TestContext};
use serde_json::{json, Value};
use tower::util::ServiceExt;

async fn send(ctx: &TestContext, req: Request<Body>) -> (StatusCode, Value) {
    let response = ctx.app().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let ctx = TestContext::new().await;
    let (status, body) = send(&ctx, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["uptime_secs"].is_number());
}

#[tokio::test]
async fn empty_fleet_lists_nothing() {
    let ctx = TestContext::new().await;
    let (status, body) = send(&ctx, get("/api/v1/domains")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["page"], 1);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn sync_is_idempotent_and_emits_events() {
    let ctx = TestContext::new().await;
    ctx.provider.set(vec![
        provider_domain("a.example.com", "example.com"),
        provider_domain("b.example.com", "example.com"),
    ]);

    let (status, body) = send(&ctx, json_request("POST", "/api/v1/domains/sync", json!({}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], true);
    settle().await;
    assert_eq!(ctx.store.list_all().await.unwrap().len(), 2);

    let (status, _) = send(&ctx, json_request("POST", "/api/v1/domains/sync", json!({}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    settle().await;
    assert_eq!(ctx.store.list_all().await.unwrap().len(), 2);

    let events = ctx.sink.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.kind == certwatch_common::types::EventKind::DomainAdded));
}

#[tokio::test]
async fn list_filters_by_status_and_zone() {
    let ctx = TestContext::new().await;
    ctx.provider.set(vec![
        provider_domain("ok.example.com", "example.com"),
        provider_domain("soon.example.com", "example.com"),
        provider_domain("dead.other.net", "other.net"),
    ]);
    ctx.reconciler.sync(ctx.provider.as_ref()).await.unwrap();

    ctx.prober
        .set("ok.example.com", healthy_measurement(Utc::now() + Duration::days(90)));
    ctx.prober
        .set("soon.example.com", healthy_measurement(Utc::now() + Duration::days(10)));
    // dead.other.net has no script, so it probes as unresolvable
    for record in ctx.store.list_scannable().await.unwrap() {
        ctx.reconciler
            .scan_domain(ctx.prober.as_ref(), &record, 30)
            .await
            .unwrap();
    }

    let (status, body) = send(&ctx, get("/api/v1/domains?status=warning")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["domain_name"], "soon.example.com");

    let (_, body) = send(&ctx, get("/api/v1/domains?zone=other.net")).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["status"], "unresolvable");

    let (_, body) = send(&ctx, get("/api/v1/domains?status=active_only")).await;
    assert_eq!(body["total"], 2);

    let (status, _) = send(&ctx, get("/api/v1/domains?status=nonsense")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&ctx, get("/api/v1/zones")).await;
    let zones = body["data"].as_array().unwrap();
    assert_eq!(zones.len(), 2);
}

#[tokio::test]
async fn domain_settings_toggle_and_batch() {
    let ctx = TestContext::new().await;
    ctx.provider.set(vec![
        provider_domain("a.example.com", "example.com"),
        provider_domain("b.example.com", "example.com"),
    ]);
    ctx.reconciler.sync(ctx.provider.as_ref()).await.unwrap();
    let a = ctx.store.get_by_name("a.example.com").await.unwrap().unwrap();
    let b = ctx.store.get_by_name("b.example.com").await.unwrap().unwrap();

    let (status, body) = send(
        &ctx,
        json_request(
            "PATCH",
            &format!("/api/v1/domains/{}/settings", a.id),
            json!({ "is_ignored": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_ignored"], true);

    let (status, _) = send(
        &ctx,
        json_request(
            "PATCH",
            "/api/v1/domains/no-such-id/settings",
            json!({ "is_ignored": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &ctx,
        json_request(
            "PATCH",
            "/api/v1/domains/settings/batch",
            json!({ "ids": [b.id, "missing"], "is_ignored": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"].as_array().unwrap().len(), 1);
    assert_eq!(body["failed"][0]["id"], "missing");

    let (status, _) = send(
        &ctx,
        json_request(
            "PATCH",
            "/api/v1/domains/settings/batch",
            json!({ "ids": [], "is_ignored": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notification_settings_roundtrip() {
    let ctx = TestContext::new().await;

    let (status, body) = send(&ctx, get("/api/v1/settings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["webhook_enabled"], false);

    let mut settings = body["data"].clone();
    settings["webhook_enabled"] = json!(true);
    settings["webhook_url"] = json!("https://hooks.example.com/x");
    let (status, _) = send(&ctx, json_request("POST", "/api/v1/settings", settings)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&ctx, get("/api/v1/settings")).await;
    assert_eq!(body["data"]["webhook_enabled"], true);
    assert_eq!(body["data"]["webhook_url"], "https://hooks.example.com/x");
}

#[tokio::test]
async fn malformed_template_is_rejected() {
    let ctx = TestContext::new().await;
    let (_, body) = send(&ctx, get("/api/v1/settings")).await;
    let mut settings = body["data"].clone();
    settings["webhook_template"] = json!("{{.Domain");

    let (status, body) = send(&ctx, json_request("POST", "/api/v1/settings", settings)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_template");

    // nothing was persisted
    let (_, body) = send(&ctx, get("/api/v1/settings")).await;
    assert_eq!(body["data"]["webhook_template"], "");
}

#[tokio::test]
async fn test_delivery_requires_a_channel() {
    let ctx = TestContext::new().await;
    let (_, body) = send(&ctx, get("/api/v1/settings")).await;
    let settings = body["data"].clone();
    let (status, body) = send(&ctx, json_request("POST", "/api/v1/settings/test", settings)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_config");
}

#[tokio::test]
async fn acme_email_validation_and_persistence() {
    let ctx = TestContext::new().await;

    let (status, _) = send(
        &ctx,
        json_request("POST", "/api/v1/settings/acme", json!({ "email": "nonsense" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &ctx,
        json_request("POST", "/api/v1/settings/acme", json!({ "email": "ops@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["acme_email"], "ops@example.com");
}

#[tokio::test]
async fn renew_requires_acme_email_then_succeeds() {
    let ctx = TestContext::new().await;
    ctx.provider
        .set(vec![provider_domain("a.example.com", "example.com")]);
    ctx.reconciler.sync(ctx.provider.as_ref()).await.unwrap();

    let (status, body) = send(
        &ctx,
        json_request("POST", "/api/v1/domains/renew", json!({ "domain": "a.example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], "acme_not_configured");

    send(
        &ctx,
        json_request("POST", "/api/v1/settings/acme", json!({ "email": "ops@example.com" })),
    )
    .await;

    let (status, body) = send(
        &ctx,
        json_request("POST", "/api/v1/domains/renew", json!({ "domain": "a.example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], true);

    settle().await;
    let renew_event = ctx
        .sink
        .events()
        .into_iter()
        .find(|e| e.kind == certwatch_common::types::EventKind::RenewResult)
        .unwrap();
    assert_eq!(renew_event.vars["Result"], "succeeded");
    assert_eq!(renew_event.vars["Detail"], "renewed a.example.com");

    let (status, body) = send(
        &ctx,
        json_request("POST", "/api/v1/domains/renew", json!({ "domain": "unknown.example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn manual_scan_updates_records() {
    let ctx = TestContext::new().await;
    ctx.provider
        .set(vec![provider_domain("ok.example.com", "example.com")]);
    ctx.reconciler.sync(ctx.provider.as_ref()).await.unwrap();
    ctx.prober
        .set("ok.example.com", healthy_measurement(Utc::now() + Duration::days(90)));

    let (status, body) = send(&ctx, json_request("POST", "/api/v1/domains/scan", json!({}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["scanning"], 1);

    settle().await;
    let record = ctx.store.get_by_name("ok.example.com").await.unwrap().unwrap();
    assert_eq!(record.status, certwatch_common::types::Status::Active);
}

#[tokio::test]
async fn stats_reflect_fleet() {
    let ctx = TestContext::new().await;
    ctx.provider.set(vec![
        provider_domain("ok.example.com", "example.com"),
        provider_domain("soon.example.com", "example.com"),
    ]);
    ctx.reconciler.sync(ctx.provider.as_ref()).await.unwrap();
    ctx.prober
        .set("ok.example.com", healthy_measurement(Utc::now() + Duration::days(90)));
    ctx.prober
        .set("soon.example.com", healthy_measurement(Utc::now() + Duration::days(5)));
    for record in ctx.store.list_scannable().await.unwrap() {
        ctx.reconciler
            .scan_domain(ctx.prober.as_ref(), &record, 30)
            .await
            .unwrap();
    }

    let (status, body) = send(&ctx, get("/api/v1/stats")).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["total_domains"], 2);
    assert_eq!(stats["status_counts"]["active"], 1);
    assert_eq!(stats["status_counts"]["warning"], 1);
    assert_eq!(stats["expiry_counts"]["7d"], 1);
    assert_eq!(stats["expiry_counts"]["30d"], 1);
    assert_eq!(stats["issuer_counts"]["Example CA"], 2);
}
