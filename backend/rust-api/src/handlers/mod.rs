use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::error::QuizError;
use crate::metrics;
use crate::services::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut dependencies = serde_json::Map::new();

    let redis_health = check_redis(&state).await;
    let healthy = redis_health.get("status").and_then(|v| v.as_str()) != Some("unhealthy");
    dependencies.insert("redis".to_string(), json!(redis_health));

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": "cybershield-api",
            "version": env!("CARGO_PKG_VERSION"),
            "active_sessions": state.sessions.len(),
            "dependencies": dependencies
        })),
    )
}

async fn check_redis(state: &AppState) -> serde_json::Map<String, serde_json::Value> {
    let mut result = serde_json::Map::new();

    let Some(redis) = state.redis.as_ref() else {
        result.insert("status".to_string(), json!("disabled"));
        result.insert("message".to_string(), json!("Using in-process storage"));
        return result;
    };

    let mut conn = redis.clone();
    match tokio::time::timeout(
        std::time::Duration::from_millis(500),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    {
        Ok(Ok(_)) => {
            result.insert("status".to_string(), json!("healthy"));
            result.insert("message".to_string(), json!("Redis connection successful"));
        }
        Ok(Err(e)) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!(format!("Redis error: {}", e)));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!("Redis timeout after 500ms"));
        }
    }

    result
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Maps a domain error onto the `(StatusCode, String)` pair handlers return.
pub(crate) fn quiz_error(err: QuizError) -> (StatusCode, String) {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::debug!("Request rejected: {}", err);
    }
    (status, err.to_string())
}

pub(crate) fn validation_error(err: validator::ValidationErrors) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, format!("Validation error: {}", err))
}

pub mod history;
pub mod quiz;
pub mod sse;
