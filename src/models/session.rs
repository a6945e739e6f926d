// src/models/session.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Lifecycle state of an attempt session.
///
/// `active` sessions become `completed` on finish or lazy expiry, and
/// `cancelled` when the resume budget runs out. Both terminal states are
/// final; a learner starts over with a fresh row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents the 'assessment_sessions' table: one attempt in progress
/// (or its terminal record). Rows are never deleted.
///
/// Invariant: at most one row per (assessment_id, user_id) has
/// `status = active`, enforced by a partial unique index.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AssessmentSession {
    pub id: Uuid,
    pub assessment_id: i64,
    pub user_id: i64,
    pub status: SessionStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub last_resume_at: Option<chrono::DateTime<chrono::Utc>>,
    pub resume_count: i64,
    /// Set when the session reaches a terminal state.
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl AssessmentSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// DTO wrapping a session with the freshly computed countdown, returned by
/// start and resume so clients can seed their timer. `remaining_seconds` is
/// None for untimed assessments, never 0.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: AssessmentSession,
    pub remaining_seconds: Option<i64>,
}

/// DTO for finishing an attempt. The score comes from the caller since
/// grading happens outside the engine; missing means 0.
#[derive(Debug, Default, Deserialize)]
pub struct FinishAttemptRequest {
    pub score: Option<i64>,
}
