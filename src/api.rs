use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::metrics::Metrics;
use crate::pipeline::RunReport;
use crate::scheduler::{Scheduler, SchedulerStatus};
use crate::selftest::{run_self_test, SelfTestReport};
use crate::store::StoredNews;

const HISTORY_LIMIT: usize = 10;
const DEFAULT_NEWS_LIMIT: usize = 10;
const MAX_NEWS_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    scheduler: Arc<Scheduler>,
}

/// Routes over a shared scheduler. `/metrics` is mounted only when a recorder exists.
pub fn create_router(scheduler: Arc<Scheduler>, metrics: Option<&Metrics>) -> Router {
    let state = AppState { scheduler };

    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/run-once", get(run_once).post(run_once))
        .route("/history", get(history))
        .route("/news", get(latest_news))
        .route("/test", get(self_test))
        .with_state(state);

    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "scheduler_running": state.scheduler.is_running(),
        "endpoints": {
            "health": "/health",
            "status": "/status",
            "run_once": "/run-once",
            "history": "/history",
            "news": "/news",
            "test": "/test",
        },
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "scheduler_running": state.scheduler.is_running(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

#[derive(serde::Serialize)]
struct RunOnceOut {
    status: &'static str,
    report: RunReport,
}

async fn run_once(State(state): State<AppState>) -> Json<RunOnceOut> {
    tracing::info!("manual run requested over http");
    let report = state.scheduler.run_once().await;
    Json(RunOnceOut {
        status: if report.success { "completed" } else { "failed" },
        report,
    })
}

async fn history(State(state): State<AppState>) -> Json<Vec<RunReport>> {
    Json(state.scheduler.history().snapshot_last_n(HISTORY_LIMIT))
}

#[derive(serde::Deserialize)]
struct NewsQuery {
    limit: Option<usize>,
}

async fn latest_news(
    State(state): State<AppState>,
    Query(q): Query<NewsQuery>,
) -> Json<Vec<StoredNews>> {
    let limit = q
        .limit
        .unwrap_or(DEFAULT_NEWS_LIMIT)
        .clamp(1, MAX_NEWS_LIMIT);
    Json(state.scheduler.agent().store().latest(limit).await)
}

async fn self_test(State(state): State<AppState>) -> Json<SelfTestReport> {
    Json(run_self_test(&state.scheduler).await)
}
