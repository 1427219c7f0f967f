//! Health check handlers.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(serde::Serialize)]
pub(super) struct HealthCheckResponse {
    pub status: String,
    pub kv: String,
    pub kv_backend: &'static str,
    pub storage: String,
}

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - the job store must answer.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.kv.store.clone();
    let kv = run_check(TIMEOUT, store.check_connection(), "not_ready").await;

    if kv == "healthy" {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ready", "kv": "ready" })),
        )
    } else {
        tracing::error!(kv = %kv, "Readiness check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not_ready", "kv": kv })),
        )
    }
}

/// Full health check (job store and object storage).
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.kv.store.clone();
    let storage = state.links.storage.clone();

    let kv = run_check(TIMEOUT, store.check_connection(), "unhealthy").await;
    let storage = run_check(TIMEOUT, storage.check_connection(), "degraded").await;

    let status = if kv != "healthy" {
        "unhealthy"
    } else if storage != "healthy" {
        "degraded"
    } else {
        "healthy"
    };
    let status_code = if kv == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthCheckResponse {
            status: status.to_string(),
            kv,
            kv_backend: state.kv.store.backend_name(),
            storage,
        }),
    )
}
