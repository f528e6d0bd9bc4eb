// tests/api_http.rs
//
// HTTP-level tests for the management Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use watchtower::finding::RawFinding;
use watchtower::monitor::{MonitorKind, MonitorRegistry};
use watchtower::source::FixtureProvider;
use watchtower::{router, AppState, CheckScheduler};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn test_router() -> Router {
    let provider = FixtureProvider::new().with(
        MonitorKind::JobPostings,
        vec![RawFinding::from_pairs([
            ("company", "Acme"),
            ("title", "AI Engineer"),
            ("url", "acme.com/1"),
        ])],
    );
    let registry = Arc::new(MonitorRegistry::default());
    let scheduler = Arc::new(CheckScheduler::new(registry, Arc::new(provider)));
    router(AppState::new(scheduler, None))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, json)
}

fn job_monitor_body() -> Json {
    json!({
        "kind": "job_postings",
        "parameters": {"companies": ["Acme"], "keywords": ["AI"]},
        "contact": "ops-team",
        "frequency": "daily"
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_router();
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), "ok");
}

#[tokio::test]
async fn monitor_lifecycle_over_http() {
    let app = test_router();

    let (status, created) = call(&app, "POST", "/monitors", Some(job_monitor_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().expect("id").to_string();
    assert!(id.starts_with("job_monitor_"), "unexpected id {id}");
    assert_eq!(created["active"], true);
    assert_eq!(created["frequency_secs"], 86_400);
    assert_eq!(created["seen_count"], 0);
    assert!(created["last_checked"].is_null());

    let (status, fetched) = call(&app, "GET", &format!("/monitors/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id.as_str());

    let (status, off) = call(&app, "POST", &format!("/monitors/{id}/deactivate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(off["active"], false);

    let (_, active) = call(&app, "GET", "/monitors?active_only=true", None).await;
    assert_eq!(active.as_array().map(Vec::len), Some(0));
    let (_, all) = call(&app, "GET", "/monitors", None).await;
    assert_eq!(all.as_array().map(Vec::len), Some(1));

    let (status, on) = call(&app, "POST", &format!("/monitors/{id}/activate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(on["active"], true);
}

#[tokio::test]
async fn numeric_frequency_is_seconds() {
    let app = test_router();
    let mut body = job_monitor_body();
    body["frequency"] = json!(120);
    let (status, created) = call(&app, "POST", "/monitors", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["frequency_secs"], 120);
}

#[tokio::test]
async fn oversized_frequency_is_rejected_and_cycles_keep_running() {
    let app = test_router();
    let mut body = job_monitor_body();
    body["frequency"] = json!(10_000_000_000_000_000u64);
    let (status, err) = call(&app, "POST", "/monitors", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap_or_default().contains("frequency"));

    let mut named = job_monitor_body();
    named["frequency"] = json!("10000000000000000");
    let (status, _) = call(&app, "POST", "/monitors", Some(named)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    call(&app, "POST", "/monitors", Some(job_monitor_body())).await;
    for _ in 0..2 {
        let (status, _) = call(&app, "POST", "/cycle", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn invalid_parameters_are_rejected_with_400() {
    let app = test_router();
    let body = json!({
        "kind": "industry_news",
        "parameters": {"keywords": ["LLM"]},
        "contact": "ops-team"
    });
    let (status, err) = call(&app, "POST", "/monitors", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap_or_default().contains("invalid parameters"));

    let mut bad_freq = job_monitor_body();
    bad_freq["frequency"] = json!("fortnightly");
    let (status, _) = call(&app, "POST", "/monitors", Some(bad_freq)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, all) = call(&app, "GET", "/monitors", None).await;
    assert_eq!(all.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn unknown_monitor_is_404() {
    let app = test_router();
    let (status, err) = call(&app, "GET", "/monitors/job_monitor_nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(err["error"].is_string());

    let (status, _) = call(&app, "POST", "/monitors/job_monitor_nope/deactivate", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cycle_then_digest() {
    let app = test_router();
    call(&app, "POST", "/monitors", Some(job_monitor_body())).await;

    let (status, report) = call(&app, "POST", "/cycle", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["monitors_checked"], 1);
    assert_eq!(report["alerts_generated"], 1);
    assert_eq!(report["findings"][0]["priority"], "HIGH");

    // Checked moments ago with a daily frequency: not due.
    let (_, again) = call(&app, "POST", "/cycle", None).await;
    assert_eq!(again["monitors_checked"], 0);
    assert_eq!(again["alerts_generated"], 0);

    let (status, digest) = call(&app, "GET", "/digest?contact=ops-team&days=7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(digest["contact"], "ops-team");
    assert_eq!(digest["alerts_included"], 1);
    assert_eq!(digest["highlights"].as_array().map(Vec::len), Some(1));
    assert_eq!(digest["counts"]["job_postings"], 1);

    let (_, other) = call(&app, "GET", "/digest?contact=someone-else", None).await;
    assert_eq!(other["alerts_included"], 0);
}

#[tokio::test]
async fn digest_window_must_be_complete() {
    let app = test_router();
    let (status, _) = call(
        &app,
        "GET",
        "/digest?contact=ops-team&start=2025-09-01T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        "GET",
        "/digest?contact=ops-team&start=2025-09-08T00:00:00Z&end=2025-09-01T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, digest) = call(
        &app,
        "GET",
        "/digest?contact=ops-team&start=2025-09-01T00:00:00Z&end=2025-09-08T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(digest["window"]["start"], "2025-09-01T00:00:00Z");
}

#[tokio::test]
async fn digest_days_beyond_the_calendar_are_rejected() {
    let app = test_router();
    let (status, err) = call(&app, "GET", "/digest?contact=ops-team&days=100000000", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap_or_default().contains("days"));

    let (status, _) = call(&app, "GET", "/digest?contact=ops-team&days=3650", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn rank_endpoint_orders_and_summarizes() {
    let app = test_router();
    let body = json!({
        "items": [
            {"name": "small", "impact": 5, "urgency": 5},
            {"name": "big", "impact": 9, "urgency": 9}
        ],
        "weights": {"impact": 0.5, "urgency": 0.5}
    });
    let (status, out) = call(&app, "POST", "/rank", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["ranked_items"][0]["rank"], 1);
    assert_eq!(out["ranked_items"][0]["item"]["name"], "big");
    assert_eq!(out["ranked_items"][0]["score"], 9.0);
    assert_eq!(out["ranked_items"][1]["score"], 5.0);
    assert_eq!(out["ranked_items"][1]["priority"], "LOW");
    assert_eq!(out["summary"]["top_priority_count"], 1);
}
