// src/engine/memory.rs
//
// In-memory implementations of the store traits, used by the test suites
// and handy for local development without a database. Semantics mirror the
// Postgres implementations, including the single-active insert guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
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

#[derive(Default)]
pub struct MemoryAssessmentStore {
    next_id: AtomicI64,
    next_override_id: AtomicI64,
    assessments: Mutex<HashMap<i64, Assessment>>,
    overrides: Mutex<HashMap<(i64, i64), AssessmentOverride>>,
}

impl MemoryAssessmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssessmentStore for MemoryAssessmentStore {
    async fn find_assessment(&self, id: i64) -> Result<Option<Assessment>, EngineError> {
        Ok(self.assessments.lock().unwrap().get(&id).cloned())
    }

    async fn find_override(
        &self,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<Option<AssessmentOverride>, EngineError> {
        Ok(self
            .overrides
            .lock()
            .unwrap()
            .get(&(assessment_id, user_id))
            .cloned())
    }

    async fn list_assessments(&self) -> Result<Vec<Assessment>, EngineError> {
        let mut rows: Vec<Assessment> =
            self.assessments.lock().unwrap().values().cloned().collect();
        rows.sort_by_key(|a| std::cmp::Reverse(a.id));
        Ok(rows)
    }

    async fn create_assessment(
        &self,
        req: &CreateAssessmentRequest,
    ) -> Result<Assessment, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let assessment = Assessment {
            id,
            title: req.title.clone(),
            description: req.description.clone(),
            duration_minutes: req.duration_minutes,
            start_at: req.start_at,
            end_at: req.end_at,
            allowed_attempts: req.allowed_attempts,
            resume_limit: req.resume_limit,
            allowed_languages: req.allowed_languages.clone().map(Json),
            created_at: Some(Utc::now()),
        };
        self.assessments
            .lock()
            .unwrap()
            .insert(id, assessment.clone());
        Ok(assessment)
    }

    async fn update_assessment(
        &self,
        id: i64,
        req: &UpdateAssessmentRequest,
    ) -> Result<Option<Assessment>, EngineError> {
        let mut rows = self.assessments.lock().unwrap();
        let Some(assessment) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &req.title {
            assessment.title = title.clone();
        }
        if let Some(description) = &req.description {
            assessment.description = Some(description.clone());
        }
        if let Some(duration) = req.duration_minutes {
            assessment.duration_minutes = Some(duration);
        }
        if let Some(start_at) = req.start_at {
            assessment.start_at = Some(start_at);
        }
        if let Some(end_at) = req.end_at {
            assessment.end_at = Some(end_at);
        }
        if let Some(allowed) = req.allowed_attempts {
            assessment.allowed_attempts = Some(allowed);
        }
        if let Some(limit) = req.resume_limit {
            assessment.resume_limit = Some(limit);
        }
        if let Some(languages) = &req.allowed_languages {
            assessment.allowed_languages = Some(Json(languages.clone()));
        }
        Ok(Some(assessment.clone()))
    }

    async fn delete_assessment(&self, id: i64) -> Result<bool, EngineError> {
        Ok(self.assessments.lock().unwrap().remove(&id).is_some())
    }

    async fn upsert_override(
        &self,
        assessment_id: i64,
        req: &UpsertOverrideRequest,
    ) -> Result<AssessmentOverride, EngineError> {
        let id = self.next_override_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = AssessmentOverride {
            id,
            assessment_id,
            user_id: req.user_id,
            max_attempts: req.max_attempts,
            resume_limit: req.resume_limit,
            start_at: req.start_at,
            end_at: req.end_at,
            allowed_languages: req.allowed_languages.clone().map(Json),
            created_at: Some(Utc::now()),
        };
        self.overrides
            .lock()
            .unwrap()
            .insert((assessment_id, req.user_id), row.clone());
        Ok(row)
    }

    async fn delete_override(
        &self,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<bool, EngineError> {
        Ok(self
            .overrides
            .lock()
            .unwrap()
            .remove(&(assessment_id, user_id))
            .is_some())
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    rows: Mutex<HashMap<Uuid, AssessmentSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw row lookup for test assertions.
    pub fn get(&self, id: Uuid) -> Option<AssessmentSession> {
        self.rows.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_active(
        &self,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<Option<AssessmentSession>, EngineError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.assessment_id == assessment_id
                    && s.user_id == user_id
                    && s.status == SessionStatus::Active
            })
            .max_by_key(|s| s.started_at)
            .cloned())
    }

    async fn find_owned(
        &self,
        id: Uuid,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<Option<AssessmentSession>, EngineError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&id)
            .filter(|s| s.assessment_id == assessment_id && s.user_id == user_id)
            .cloned())
    }

    async fn insert_active(
        &self,
        assessment_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<SessionInsert, EngineError> {
        // Check-then-insert under one lock, standing in for the partial
        // unique index.
        let mut rows = self.rows.lock().unwrap();
        let already_active = rows.values().any(|s| {
            s.assessment_id == assessment_id
                && s.user_id == user_id
                && s.status == SessionStatus::Active
        });
        if already_active {
            return Ok(SessionInsert::Conflict);
        }
        let session = AssessmentSession {
            id: Uuid::new_v4(),
            assessment_id,
            user_id,
            status: SessionStatus::Active,
            started_at: now,
            last_resume_at: None,
            resume_count: 0,
            ended_at: None,
        };
        rows.insert(session.id, session.clone());
        Ok(SessionInsert::Created(session))
    }

    async fn record_resume(
        &self,
        id: Uuid,
        resume_count: i64,
        now: DateTime<Utc>,
    ) -> Result<AssessmentSession, EngineError> {
        let mut rows = self.rows.lock().unwrap();
        let session = rows.get_mut(&id).ok_or(EngineError::SessionNotActive)?;
        if session.status != SessionStatus::Active {
            return Err(EngineError::SessionNotActive);
        }
        session.resume_count = resume_count;
        session.last_resume_at = Some(now);
        Ok(session.clone())
    }

    async fn close(
        &self,
        id: Uuid,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<AssessmentSession>, EngineError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(session) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if session.status != SessionStatus::Active {
            return Ok(None);
        }
        session.status = status;
        session.ended_at = Some(now);
        Ok(Some(session.clone()))
    }
}

#[derive(Default)]
pub struct MemoryAttemptLedger {
    next_id: AtomicI64,
    rows: Mutex<Vec<Submission>>,
    fail_counts: AtomicBool,
}

impl MemoryAttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent counts behave as if the datastore read failed,
    /// to exercise the fail-open policy.
    pub fn set_fail_counts(&self, fail: bool) {
        self.fail_counts.store(fail, Ordering::SeqCst);
    }

    /// Everything recorded so far, for test assertions.
    pub fn recorded(&self) -> Vec<Submission> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttemptLedger for MemoryAttemptLedger {
    async fn count_attempts(&self, assessment_id: i64, user_id: i64) -> i64 {
        if self.fail_counts.load(Ordering::SeqCst) {
            tracing::warn!("Failed to count attempts, treating as 0: simulated failure");
            return 0;
        }
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.assessment_id == assessment_id && s.user_id == user_id)
            .count() as i64
    }

    async fn record_submission(
        &self,
        assessment_id: i64,
        user_id: i64,
        score: i64,
        auto_submitted: bool,
        now: DateTime<Utc>,
    ) -> Result<Submission, EngineError> {
        let submission = Submission {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            assessment_id,
            user_id,
            score,
            auto_submitted,
            created_at: Some(now),
        };
        self.rows.lock().unwrap().push(submission.clone());
        Ok(submission)
    }
}
