// src/models/assessment.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Represents the 'assessments' table in the database.
///
/// Timing and attempt rules are all nullable: a missing value falls back to
/// the engine default when effective settings are resolved.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Assessment {
    pub id: i64,

    pub title: String,

    pub description: Option<String>,

    /// Attempt length in minutes. NULL = untimed.
    pub duration_minutes: Option<i64>,

    /// Window during which the assessment may be started or resumed.
    /// A missing bound is unbounded on that side.
    pub start_at: Option<chrono::DateTime<chrono::Utc>>,
    pub end_at: Option<chrono::DateTime<chrono::Utc>>,

    /// How many attempts a learner gets. NULL = engine default (1).
    pub allowed_attempts: Option<i64>,

    /// How many times an active attempt may be re-entered. NULL = default (0).
    pub resume_limit: Option<i64>,

    /// Languages the external code runner accepts for this assessment.
    /// Stored as a JSON array. NULL = unrestricted.
    pub allowed_languages: Option<Json<Vec<String>>>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'assessment_overrides' table: at most one row per
/// (assessment, user), loosening or tightening the defaults for one learner.
/// `duration_minutes` can never be overridden.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AssessmentOverride {
    pub id: i64,
    pub assessment_id: i64,
    pub user_id: i64,
    pub max_attempts: Option<i64>,
    pub resume_limit: Option<i64>,
    pub start_at: Option<chrono::DateTime<chrono::Utc>>,
    pub end_at: Option<chrono::DateTime<chrono::Utc>>,
    pub allowed_languages: Option<Json<Vec<String>>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new assessment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssessmentRequest {
    #[validate(length(min = 1, max = 200, message = "Title length must be between 1 and 200 characters."))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Duration must be at least one minute."))]
    pub duration_minutes: Option<i64>,
    pub start_at: Option<chrono::DateTime<chrono::Utc>>,
    pub end_at: Option<chrono::DateTime<chrono::Utc>>,
    #[validate(range(min = 1, message = "At least one attempt must be allowed."))]
    pub allowed_attempts: Option<i64>,
    #[validate(range(min = 0))]
    pub resume_limit: Option<i64>,
    pub allowed_languages: Option<Vec<String>>,
}

/// DTO for updating an assessment. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAssessmentRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub duration_minutes: Option<i64>,
    pub start_at: Option<chrono::DateTime<chrono::Utc>>,
    pub end_at: Option<chrono::DateTime<chrono::Utc>>,
    #[validate(range(min = 1))]
    pub allowed_attempts: Option<i64>,
    #[validate(range(min = 0))]
    pub resume_limit: Option<i64>,
    pub allowed_languages: Option<Vec<String>>,
}

/// DTO for granting or replacing a per-learner override.
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertOverrideRequest {
    pub user_id: i64,
    #[validate(range(min = 1))]
    pub max_attempts: Option<i64>,
    #[validate(range(min = 0))]
    pub resume_limit: Option<i64>,
    pub start_at: Option<chrono::DateTime<chrono::Utc>>,
    pub end_at: Option<chrono::DateTime<chrono::Utc>>,
    pub allowed_languages: Option<Vec<String>>,
}
