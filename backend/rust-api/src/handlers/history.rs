use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use super::{quiz_error, validation_error};
use crate::{models::history::UserPreferences, services::AppState};
use validator::Validate;

/// GET /api/v1/history
pub async fn get_history(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let history = state.history.read_history().await.map_err(quiz_error)?;
    Ok(Json(history))
}

/// DELETE /api/v1/history
pub async fn clear_history(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.history.clear_history().await.map_err(quiz_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/history/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let stats = state.history.stats().await.map_err(quiz_error)?;
    Ok(Json(stats))
}

/// GET /api/v1/audit
pub async fn get_audit_logs(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let logs = state.history.audit_logs().await.map_err(quiz_error)?;
    Ok(Json(logs))
}

/// DELETE /api/v1/audit
pub async fn clear_audit_logs(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.history.clear_audit_logs().await.map_err(quiz_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/preferences
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let prefs = state.history.preferences().await.map_err(quiz_error)?;
    Ok(Json(prefs))
}

/// PUT /api/v1/preferences
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Json(prefs): Json<UserPreferences>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    prefs.validate().map_err(validation_error)?;
    let saved = state
        .history
        .save_preferences(prefs)
        .await
        .map_err(quiz_error)?;
    tracing::info!("Preferences updated for {}", saved.user_name);
    Ok(Json(saved))
}
