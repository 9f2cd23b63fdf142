use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{quiz_error, validation_error};
use crate::{
    models::session::{
        CreateRoomRequest, CreateSoloRequest, JoinRoomRequest, SessionCreatedResponse,
        SubmitAnswerRequest,
    },
    services::{session_service::SessionHandle, AppState},
};

fn created(state: &AppState, handle: SessionHandle) -> (StatusCode, Json<SessionCreatedResponse>) {
    let snapshot = handle.snapshot();
    state.sessions.insert(handle);
    (
        StatusCode::CREATED,
        Json(SessionCreatedResponse {
            session_id: snapshot.session_id,
            room_code: snapshot.room_code.clone(),
            snapshot,
        }),
    )
}

/// POST /api/v1/quiz/solo
pub async fn create_solo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSoloRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate().map_err(validation_error)?;
    tracing::info!(
        "Creating solo quiz: {} {} questions",
        req.question_count,
        req.difficulty
    );

    let handle = state
        .controller
        .start_solo(req.question_count, req.difficulty)
        .map_err(quiz_error)?;
    Ok(created(&state, handle))
}

/// POST /api/v1/quiz/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate().map_err(validation_error)?;

    let handle = state
        .controller
        .create_room(req.question_count, req.difficulty)
        .map_err(quiz_error)?;
    tracing::info!("Room opened: session={}", handle.id());
    Ok(created(&state, handle))
}

/// POST /api/v1/quiz/rooms/join
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate().map_err(validation_error)?;

    let handle = state
        .controller
        .join_room(&req.room_code)
        .map_err(quiz_error)?;
    tracing::info!("Joined room {}: session={}", req.room_code, handle.id());
    Ok(created(&state, handle))
}

/// GET /api/v1/quiz/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let handle = state.sessions.get(session_id).map_err(quiz_error)?;
    Ok(Json(handle.snapshot()))
}

/// POST /api/v1/quiz/sessions/{id}/start
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Starting session: {}", session_id);

    let handle = state.sessions.get(session_id).map_err(quiz_error)?;
    let snapshot = handle.start().await.map_err(quiz_error)?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// POST /api/v1/quiz/sessions/{id}/answers
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let handle = state.sessions.get(session_id).map_err(quiz_error)?;
    let receipt = handle.answer(req.option).await.map_err(quiz_error)?;

    tracing::debug!(
        "Answer recorded: session={}, correct={}, points={}",
        session_id,
        receipt.correct,
        receipt.points
    );
    Ok(Json(receipt))
}

/// POST /api/v1/quiz/sessions/{id}/exit
pub async fn exit_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let handle = state.sessions.get(session_id).map_err(quiz_error)?;
    let outcome = handle.exit().await.map_err(quiz_error)?;
    state.sessions.remove(session_id);
    Ok(Json(outcome))
}
