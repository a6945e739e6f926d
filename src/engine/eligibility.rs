// src/engine/eligibility.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::lifecycle::SessionLifecycle;
use crate::engine::settings;
use crate::engine::store::{AssessmentStore, AttemptLedger, SessionStore};
use crate::engine::timing::{self, TimeLeft, WindowCheck};
use crate::engine::EngineError;

/// Machine-readable explanations for a negative verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    NotFound,
    BeforeStart,
    AfterEnd,
    AttemptsExhausted,
    ResumeCountExceeded,
    ActiveSessionExists,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptCounters {
    pub used: i64,
    pub allowed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumeCounters {
    pub used: i64,
    pub allowed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowInfo {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

/// The verdict. `reasons` is populated only when not eligible.
/// `remaining_seconds` is None when no countdown applies (no active
/// session, or an untimed assessment) and never 0.
#[derive(Debug, Clone, Serialize)]
pub struct EligibilityResult {
    pub eligible: bool,
    pub can_start: bool,
    pub can_resume: bool,
    pub reasons: Vec<Reason>,
    pub attempts: AttemptCounters,
    pub resume: ResumeCounters,
    pub window: WindowInfo,
    pub duration_minutes: Option<i64>,
    pub session_id: Option<Uuid>,
    pub remaining_seconds: Option<i64>,
}

impl EligibilityResult {
    /// Well-formed "not eligible" body for an unknown assessment, with all
    /// counters zeroed.
    fn not_found(now: DateTime<Utc>) -> Self {
        Self {
            eligible: false,
            can_start: false,
            can_resume: false,
            reasons: vec![Reason::NotFound],
            attempts: AttemptCounters { used: 0, allowed: 0 },
            resume: ResumeCounters { used: 0, allowed: 0 },
            window: WindowInfo {
                start_at: None,
                end_at: None,
                now,
            },
            duration_minutes: None,
            session_id: None,
            remaining_seconds: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.reasons.contains(&Reason::NotFound)
    }
}

/// Combines settings resolution, the attempt ledger and the session store
/// into a verdict. Read-only except for lazy expiry, which it delegates to
/// the lifecycle so session mutation stays in one place.
pub struct EligibilityEvaluator {
    assessments: Arc<dyn AssessmentStore>,
    sessions: Arc<dyn SessionStore>,
    ledger: Arc<dyn AttemptLedger>,
    lifecycle: Arc<SessionLifecycle>,
}

impl EligibilityEvaluator {
    pub fn new(
        assessments: Arc<dyn AssessmentStore>,
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn AttemptLedger>,
        lifecycle: Arc<SessionLifecycle>,
    ) -> Self {
        Self {
            assessments,
            sessions,
            ledger,
            lifecycle,
        }
    }

    pub async fn evaluate(
        &self,
        assessment_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<EligibilityResult, EngineError> {
        let Some(assessment) = self.assessments.find_assessment(assessment_id).await? else {
            return Ok(EligibilityResult::not_found(now));
        };
        let override_row = self
            .assessments
            .find_override(assessment_id, user_id)
            .await?;
        let settings = settings::resolve(&assessment, override_row.as_ref());

        let mut attempts_used = self.ledger.count_attempts(assessment_id, user_id).await;

        let mut active = self.sessions.find_active(assessment_id, user_id).await?;
        let mut time_left = TimeLeft::Unbounded;
        if let Some(session) = &active {
            let left = timing::time_left(
                now,
                session.started_at,
                settings.duration_minutes,
                settings.end_at,
            );
            if left.is_expired() {
                // Lazy expiry: finalize the stale session as a side effect
                // of evaluation and treat it as absent from here on. The
                // auto-submit consumed an attempt.
                self.lifecycle.finalize_expired(session, now).await?;
                attempts_used += 1;
                active = None;
            } else {
                time_left = left;
            }
        }

        let window = timing::check_window(now, settings.start_at, settings.end_at);
        let window_ok = matches!(window, WindowCheck::Open);
        let attempts_ok = attempts_used < settings.allowed_attempts;
        let can_start = window_ok && attempts_ok && active.is_none();

        let mut can_resume = false;
        let mut resume_exceeded = false;
        let mut resume_used = 0;
        let mut remaining_seconds = None;
        if let Some(session) = &active {
            resume_used = session.resume_count;
            resume_exceeded = session.resume_count + 1 > settings.resume_limit;
            remaining_seconds = time_left.remaining_seconds();
            can_resume = window_ok && !time_left.is_expired() && !resume_exceeded;
        }

        let eligible = can_start || can_resume;
        let mut reasons = Vec::new();
        if !eligible {
            match window {
                WindowCheck::NotYetOpen(_) => reasons.push(Reason::BeforeStart),
                WindowCheck::Closed(_) => reasons.push(Reason::AfterEnd),
                WindowCheck::Open => {}
            }
            if !attempts_ok {
                reasons.push(Reason::AttemptsExhausted);
            }
            if active.is_some() && resume_exceeded {
                reasons.push(Reason::ResumeCountExceeded);
            }
            // Catch-all, checked last: an active session blocks a start and
            // no more specific reason explained it.
            if active.is_some() && reasons.is_empty() {
                reasons.push(Reason::ActiveSessionExists);
            }
        }

        Ok(EligibilityResult {
            eligible,
            can_start,
            can_resume,
            reasons,
            attempts: AttemptCounters {
                used: attempts_used,
                allowed: settings.allowed_attempts,
            },
            resume: ResumeCounters {
                used: resume_used,
                allowed: settings.resume_limit,
            },
            window: WindowInfo {
                start_at: settings.start_at,
                end_at: settings.end_at,
                now,
            },
            duration_minutes: settings.duration_minutes,
            session_id: active.as_ref().map(|s| s.id),
            remaining_seconds,
        })
    }
}
