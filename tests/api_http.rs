// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /, /health, /status
// - running state survives a failed run
// - GET|POST /run-once, then /history and /news
// - GET /test
// - /metrics absent without a recorder

mod common;

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use market_news_agent::create_router;
use market_news_agent::scheduler::{Scheduler, SchedulerConfig};
use market_news_agent::store::InMemoryStore;

use common::{agent_with, market_model, scenario_items, StaticFeed};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> Router {
    let agent = agent_with(
        StaticFeed::ok(scenario_items()),
        market_model(),
        Arc::new(InMemoryStore::new()),
    );
    let scheduler = Scheduler::new(Arc::new(agent), SchedulerConfig::from_hours(6.0, 60, 5));
    create_router(scheduler, None)
}

async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, json)
}

#[tokio::test]
async fn health_before_start_reports_not_running() {
    let app = test_router();
    let (status, body) = call(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["scheduler_running"], false);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn root_describes_the_service() {
    let app = test_router();
    let (status, body) = call(&app, "GET", "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "market-news-agent");
    assert_eq!(body["endpoints"]["run_once"], "/run-once");
}

#[tokio::test]
async fn status_before_any_run() {
    let app = test_router();
    let (status, body) = call(&app, "GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_running"], false);
    assert_eq!(body["interval_hours"], 6.0);
    assert_eq!(body["runs_completed"], 0);
    assert!(body["last_run"].is_null());
    assert!(body["next_run_time"].is_null());
}

#[tokio::test]
async fn run_once_then_history_and_news() {
    let app = test_router();

    let (status, body) = call(&app, "POST", "/run-once").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["report"]["success"], true);
    assert_eq!(body["report"]["important_news_count"], 2);
    assert_eq!(body["report"]["saved_count"], 3);

    let (_, again) = call(&app, "GET", "/run-once").await;
    assert_eq!(again["status"], "completed");
    assert_eq!(again["report"]["saved_count"], 0);

    let (_, history) = call(&app, "GET", "/history").await;
    assert_eq!(history.as_array().map(Vec::len), Some(2));

    let (_, status_body) = call(&app, "GET", "/status").await;
    assert_eq!(status_body["runs_completed"], 2);
    assert_eq!(status_body["last_run"]["saved_count"], 0);

    let (_, news) = call(&app, "GET", "/news?limit=2").await;
    let news = news.as_array().expect("news array");
    assert_eq!(news.len(), 2);
    assert!(news[0]["title"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Daily news digest - "));

    let (_, all) = call(&app, "GET", "/news").await;
    assert_eq!(all.as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn failed_run_is_reported_as_failed() {
    let agent = agent_with(
        StaticFeed::err("feed down"),
        market_model(),
        Arc::new(InMemoryStore::new()),
    );
    let scheduler = Scheduler::new(Arc::new(agent), SchedulerConfig::from_hours(6.0, 60, 5));
    let app = create_router(scheduler, None);

    let (status, body) = call(&app, "POST", "/run-once").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert!(body["report"]["error"]
        .as_str()
        .unwrap_or_default()
        .contains("feed down"));
}

#[tokio::test]
async fn started_scheduler_stays_running_after_failed_run() {
    let agent = agent_with(
        StaticFeed::err("feed down"),
        market_model(),
        Arc::new(InMemoryStore::new()),
    );
    let scheduler = Scheduler::new(Arc::new(agent), SchedulerConfig::from_hours(6.0, 60, 5));
    scheduler.start(false).await;
    let app = create_router(scheduler.clone(), None);

    let (_, body) = call(&app, "POST", "/run-once").await;
    assert_eq!(body["status"], "failed");

    let (status, health) = call(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["scheduler_running"], true);

    let (_, status_body) = call(&app, "GET", "/status").await;
    assert_eq!(status_body["is_running"], true);
    assert_eq!(status_body["runs_completed"], 1);
    assert_eq!(status_body["last_run"]["success"], false);

    assert!(scheduler.stop().await);
    let (_, health) = call(&app, "GET", "/health").await;
    assert_eq!(health["scheduler_running"], false);
}

#[tokio::test]
async fn self_test_passes_with_healthy_components() {
    let app = test_router();
    let (status, body) = call(&app, "GET", "/test").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["passed"], true, "{body}");
    let names: Vec<&str> = body["checks"]
        .as_array()
        .expect("checks")
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, vec!["storage", "feed", "classifier", "pipeline"]);
}

#[tokio::test]
async fn metrics_route_is_absent_without_recorder() {
    let app = test_router();
    let (status, _) = call(&app, "GET", "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
