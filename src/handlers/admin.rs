// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::assessment::{
        CreateAssessmentRequest, UpdateAssessmentRequest, UpsertOverrideRequest,
    },
    state::AppState,
};

/// Lists all assessments.
/// Admin only.
pub async fn list_assessments(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let assessments = state.assessments.list_assessments().await?;
    Ok(Json(assessments))
}

/// Creates a new assessment.
/// Admin only.
pub async fn create_assessment(
    State(state): State<AppState>,
    Json(payload): Json<CreateAssessmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let assessment = state.assessments.create_assessment(&payload).await?;
    Ok((StatusCode::CREATED, Json(assessment)))
}

/// Updates the provided fields of an assessment.
/// Admin only.
pub async fn update_assessment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateAssessmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let assessment = state
        .assessments
        .update_assessment(id, &payload)
        .await?
        .ok_or(AppError::NotFound("Assessment not found".to_string()))?;
    Ok(Json(assessment))
}

/// Deletes an assessment (and, via the store, its overrides and sessions).
/// Admin only.
pub async fn delete_assessment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.assessments.delete_assessment(id).await?;
    if !deleted {
        return Err(AppError::NotFound("Assessment not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Grants or replaces a per-learner override on an assessment.
/// Admin only.
pub async fn upsert_override(
    State(state): State<AppState>,
    Path(assessment_id): Path<i64>,
    Json(payload): Json<UpsertOverrideRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // The override must point at a real assessment.
    state
        .assessments
        .find_assessment(assessment_id)
        .await?
        .ok_or(AppError::NotFound("Assessment not found".to_string()))?;

    let row = state
        .assessments
        .upsert_override(assessment_id, &payload)
        .await?;
    Ok(Json(row))
}

/// Removes a per-learner override.
/// Admin only.
pub async fn delete_override(
    State(state): State<AppState>,
    Path((assessment_id, user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state
        .assessments
        .delete_override(assessment_id, user_id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound("Override not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
