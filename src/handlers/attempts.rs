// src/handlers/attempts.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::session::{FinishAttemptRequest, SessionResponse},
    state::AppState,
    utils::jwt::Claims,
};

/// Reports whether the caller may start or resume an attempt right now.
///
/// Always returns a well-formed verdict body; an unknown assessment gets
/// 404 with `reasons: ["not_found"]` rather than a bare error.
pub async fn get_eligibility(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let result = state
        .evaluator
        .evaluate(assessment_id, user_id, Utc::now())
        .await?;

    let status = if result.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)))
}

/// Starts a new attempt for the caller.
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let (session, left) = state
        .lifecycle
        .start(assessment_id, user_id, Utc::now())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session,
            remaining_seconds: left.remaining_seconds(),
        }),
    ))
}

/// Re-enters an active attempt (e.g. after a tab reload), spending one unit
/// of the resume budget.
pub async fn resume_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((assessment_id, session_id)): Path<(i64, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let (session, left) = state
        .lifecycle
        .resume(session_id, assessment_id, user_id, Utc::now())
        .await?;

    Ok(Json(SessionResponse {
        session,
        remaining_seconds: left.remaining_seconds(),
    }))
}

/// Completes an attempt. Safe to retry: a session already completed or
/// cancelled is returned as-is.
pub async fn finish_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((assessment_id, session_id)): Path<(i64, Uuid)>,
    Json(payload): Json<FinishAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let session = state
        .lifecycle
        .finish(
            session_id,
            assessment_id,
            user_id,
            Utc::now(),
            payload.score.unwrap_or(0),
        )
        .await?;

    Ok(Json(session))
}
