// src/engine/postgres.rs
//
// sqlx-backed implementations of the store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::engine::store::{
    AssessmentStore, AttemptLedger, SessionInsert, SessionStore,
};
use crate::engine::EngineError;
use crate::models::assessment::{
    Assessment, AssessmentOverride, CreateAssessmentRequest, UpdateAssessmentRequest,
    UpsertOverrideRequest,
};
use crate::models::session::{AssessmentSession, SessionStatus};
use crate::models::submission::Submission;

fn store_err(context: &str, e: sqlx::Error) -> EngineError {
    tracing::error!("{}: {:?}", context, e);
    EngineError::Store(e.to_string())
}

#[derive(Clone)]
pub struct PgAssessmentStore {
    pool: PgPool,
}

impl PgAssessmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssessmentStore for PgAssessmentStore {
    async fn find_assessment(&self, id: i64) -> Result<Option<Assessment>, EngineError> {
        sqlx::query_as::<_, Assessment>("SELECT * FROM assessments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("Failed to load assessment", e))
    }

    async fn find_override(
        &self,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<Option<AssessmentOverride>, EngineError> {
        sqlx::query_as::<_, AssessmentOverride>(
            "SELECT * FROM assessment_overrides WHERE assessment_id = $1 AND user_id = $2",
        )
        .bind(assessment_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("Failed to load assessment override", e))
    }

    async fn list_assessments(&self) -> Result<Vec<Assessment>, EngineError> {
        sqlx::query_as::<_, Assessment>("SELECT * FROM assessments ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("Failed to list assessments", e))
    }

    async fn create_assessment(
        &self,
        req: &CreateAssessmentRequest,
    ) -> Result<Assessment, EngineError> {
        sqlx::query_as::<_, Assessment>(
            "INSERT INTO assessments \
             (title, description, duration_minutes, start_at, end_at, allowed_attempts, resume_limit, allowed_languages) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(&req.title)
        .bind(&req.description)
        .bind(req.duration_minutes)
        .bind(req.start_at)
        .bind(req.end_at)
        .bind(req.allowed_attempts)
        .bind(req.resume_limit)
        .bind(req.allowed_languages.clone().map(Json))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_err("Failed to create assessment", e))
    }

    async fn update_assessment(
        &self,
        id: i64,
        req: &UpdateAssessmentRequest,
    ) -> Result<Option<Assessment>, EngineError> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM assessments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("Failed to check assessment", e))?;
        if exists.is_none() {
            return Ok(None);
        }

        // Update provided fields one by one, mirroring the optional DTO.
        if let Some(title) = &req.title {
            sqlx::query("UPDATE assessments SET title = $1 WHERE id = $2")
                .bind(title)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| store_err("Failed to update title", e))?;
        }
        if let Some(description) = &req.description {
            sqlx::query("UPDATE assessments SET description = $1 WHERE id = $2")
                .bind(description)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| store_err("Failed to update description", e))?;
        }
        if let Some(duration) = req.duration_minutes {
            sqlx::query("UPDATE assessments SET duration_minutes = $1 WHERE id = $2")
                .bind(duration)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| store_err("Failed to update duration", e))?;
        }
        if let Some(start_at) = req.start_at {
            sqlx::query("UPDATE assessments SET start_at = $1 WHERE id = $2")
                .bind(start_at)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| store_err("Failed to update start_at", e))?;
        }
        if let Some(end_at) = req.end_at {
            sqlx::query("UPDATE assessments SET end_at = $1 WHERE id = $2")
                .bind(end_at)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| store_err("Failed to update end_at", e))?;
        }
        if let Some(allowed) = req.allowed_attempts {
            sqlx::query("UPDATE assessments SET allowed_attempts = $1 WHERE id = $2")
                .bind(allowed)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| store_err("Failed to update allowed_attempts", e))?;
        }
        if let Some(limit) = req.resume_limit {
            sqlx::query("UPDATE assessments SET resume_limit = $1 WHERE id = $2")
                .bind(limit)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| store_err("Failed to update resume_limit", e))?;
        }
        if let Some(languages) = &req.allowed_languages {
            sqlx::query("UPDATE assessments SET allowed_languages = $1 WHERE id = $2")
                .bind(Json(languages.clone()))
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| store_err("Failed to update allowed_languages", e))?;
        }

        self.find_assessment(id).await
    }

    async fn delete_assessment(&self, id: i64) -> Result<bool, EngineError> {
        let result = sqlx::query("DELETE FROM assessments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("Failed to delete assessment", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_override(
        &self,
        assessment_id: i64,
        req: &UpsertOverrideRequest,
    ) -> Result<AssessmentOverride, EngineError> {
        sqlx::query_as::<_, AssessmentOverride>(
            "INSERT INTO assessment_overrides \
             (assessment_id, user_id, max_attempts, resume_limit, start_at, end_at, allowed_languages) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (assessment_id, user_id) DO UPDATE SET \
                max_attempts = EXCLUDED.max_attempts, \
                resume_limit = EXCLUDED.resume_limit, \
                start_at = EXCLUDED.start_at, \
                end_at = EXCLUDED.end_at, \
                allowed_languages = EXCLUDED.allowed_languages \
             RETURNING *",
        )
        .bind(assessment_id)
        .bind(req.user_id)
        .bind(req.max_attempts)
        .bind(req.resume_limit)
        .bind(req.start_at)
        .bind(req.end_at)
        .bind(req.allowed_languages.clone().map(Json))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_err("Failed to upsert override", e))
    }

    async fn delete_override(
        &self,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<bool, EngineError> {
        let result = sqlx::query(
            "DELETE FROM assessment_overrides WHERE assessment_id = $1 AND user_id = $2",
        )
        .bind(assessment_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to delete override", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find_active(
        &self,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<Option<AssessmentSession>, EngineError> {
        sqlx::query_as::<_, AssessmentSession>(
            "SELECT * FROM assessment_sessions \
             WHERE assessment_id = $1 AND user_id = $2 AND status = 'active' \
             ORDER BY started_at DESC LIMIT 1",
        )
        .bind(assessment_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("Failed to find active session", e))
    }

    async fn find_owned(
        &self,
        id: Uuid,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<Option<AssessmentSession>, EngineError> {
        sqlx::query_as::<_, AssessmentSession>(
            "SELECT * FROM assessment_sessions \
             WHERE id = $1 AND assessment_id = $2 AND user_id = $3",
        )
        .bind(id)
        .bind(assessment_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("Failed to find session", e))
    }

    async fn insert_active(
        &self,
        assessment_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<SessionInsert, EngineError> {
        let inserted = sqlx::query_as::<_, AssessmentSession>(
            "INSERT INTO assessment_sessions \
             (assessment_id, user_id, status, started_at, resume_count) \
             VALUES ($1, $2, 'active', $3, 0) RETURNING *",
        )
        .bind(assessment_id)
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(session) => Ok(SessionInsert::Created(session)),
            Err(e) => {
                // The partial unique index on (assessment_id, user_id)
                // WHERE status = 'active' arbitrates concurrent starts.
                if e.to_string().contains("unique constraint")
                    || e.to_string().contains("23505")
                {
                    Ok(SessionInsert::Conflict)
                } else {
                    Err(store_err("Failed to insert session", e))
                }
            }
        }
    }

    async fn record_resume(
        &self,
        id: Uuid,
        resume_count: i64,
        now: DateTime<Utc>,
    ) -> Result<AssessmentSession, EngineError> {
        sqlx::query_as::<_, AssessmentSession>(
            "UPDATE assessment_sessions \
             SET resume_count = $2, last_resume_at = $3 \
             WHERE id = $1 AND status = 'active' RETURNING *",
        )
        .bind(id)
        .bind(resume_count)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("Failed to record resume", e))?
        .ok_or(EngineError::SessionNotActive)
    }

    async fn close(
        &self,
        id: Uuid,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<AssessmentSession>, EngineError> {
        sqlx::query_as::<_, AssessmentSession>(
            "UPDATE assessment_sessions \
             SET status = $2, ended_at = $3 \
             WHERE id = $1 AND status = 'active' RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("Failed to close session", e))
    }
}

#[derive(Clone)]
pub struct PgAttemptLedger {
    pool: PgPool,
}

impl PgAttemptLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptLedger for PgAttemptLedger {
    async fn count_attempts(&self, assessment_id: i64, user_id: i64) -> i64 {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM submissions WHERE assessment_id = $1 AND user_id = $2",
        )
        .bind(assessment_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await;

        match count {
            Ok(n) => n,
            Err(e) => {
                // Fail open: a transient read failure must not lock the
                // learner out of starting.
                tracing::warn!("Failed to count attempts, treating as 0: {:?}", e);
                0
            }
        }
    }

    async fn record_submission(
        &self,
        assessment_id: i64,
        user_id: i64,
        score: i64,
        auto_submitted: bool,
        now: DateTime<Utc>,
    ) -> Result<Submission, EngineError> {
        sqlx::query_as::<_, Submission>(
            "INSERT INTO submissions (assessment_id, user_id, score, auto_submitted, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(assessment_id)
        .bind(user_id)
        .bind(score)
        .bind(auto_submitted)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_err("Failed to record submission", e))
    }
}
