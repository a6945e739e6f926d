// src/engine/store.rs
//
// Store traits the engine is written against. Production wires the sqlx
// Postgres implementations from `engine::postgres`; tests wire the
// in-memory ones from `engine::memory`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::EngineError;
use crate::models::assessment::{
    Assessment, AssessmentOverride, CreateAssessmentRequest, UpdateAssessmentRequest,
    UpsertOverrideRequest,
};
use crate::models::session::{AssessmentSession, SessionStatus};
use crate::models::submission::Submission;

/// Outcome of inserting a fresh active session row. `Conflict` means the
/// single-active invariant already holds for the pair: another request won.
#[derive(Debug)]
pub enum SessionInsert {
    Created(AssessmentSession),
    Conflict,
}

/// Read access to assessment configuration, plus the admin writes. The
/// engine itself only ever reads.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn find_assessment(&self, id: i64) -> Result<Option<Assessment>, EngineError>;

    /// The per-learner override row, if one was granted.
    async fn find_override(
        &self,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<Option<AssessmentOverride>, EngineError>;

    async fn list_assessments(&self) -> Result<Vec<Assessment>, EngineError>;

    async fn create_assessment(
        &self,
        req: &CreateAssessmentRequest,
    ) -> Result<Assessment, EngineError>;

    /// Updates the provided fields only; returns None for an unknown id.
    async fn update_assessment(
        &self,
        id: i64,
        req: &UpdateAssessmentRequest,
    ) -> Result<Option<Assessment>, EngineError>;

    async fn delete_assessment(&self, id: i64) -> Result<bool, EngineError>;

    async fn upsert_override(
        &self,
        assessment_id: i64,
        req: &UpsertOverrideRequest,
    ) -> Result<AssessmentOverride, EngineError>;

    async fn delete_override(
        &self,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<bool, EngineError>;
}

/// CRUD over attempt sessions, the only mutable state with concurrency
/// exposure. All writes are single-row and keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The active session for the pair. Most recent `started_at` wins if
    /// the invariant is somehow violated.
    async fn find_active(
        &self,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<Option<AssessmentSession>, EngineError>;

    /// Session scoped to all three ids: ownership is the authorization.
    async fn find_owned(
        &self,
        id: Uuid,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<Option<AssessmentSession>, EngineError>;

    /// Check-then-insert of a fresh active row as one logical unit.
    /// Implementations must guarantee at most one concurrent caller gets
    /// `Created` (the Postgres one leans on a partial unique index).
    async fn insert_active(
        &self,
        assessment_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<SessionInsert, EngineError>;

    async fn record_resume(
        &self,
        id: Uuid,
        resume_count: i64,
        now: DateTime<Utc>,
    ) -> Result<AssessmentSession, EngineError>;

    /// Atomically move an active session to a terminal state. Returns None
    /// when the session was no longer active (lost a race): the caller must
    /// not perform the side effects tied to the transition.
    async fn close(
        &self,
        id: Uuid,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<AssessmentSession>, EngineError>;
}

/// Counts recorded submissions per (assessment, user) pair.
#[async_trait]
pub trait AttemptLedger: Send + Sync {
    /// Completed attempts on record. Fail-open: a read failure logs and
    /// counts as zero rather than locking the learner out of starting.
    async fn count_attempts(&self, assessment_id: i64, user_id: i64) -> i64;

    /// Writes the submission row that consumes an attempt. Unlike counting,
    /// write failures do propagate.
    async fn record_submission(
        &self,
        assessment_id: i64,
        user_id: i64,
        score: i64,
        auto_submitted: bool,
        now: DateTime<Utc>,
    ) -> Result<Submission, EngineError>;
}
