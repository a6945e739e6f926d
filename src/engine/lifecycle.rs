// src/engine/lifecycle.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::settings::{self, EffectiveSettings};
use crate::engine::store::{AssessmentStore, AttemptLedger, SessionInsert, SessionStore};
use crate::engine::timing::{self, TimeLeft, WindowCheck};
use crate::engine::EngineError;
use crate::events::{AttemptEvent, EventSink};
use crate::models::session::{AssessmentSession, SessionStatus};

/// The attempt state machine: `(none) -> active -> completed | cancelled`,
/// with a fresh start allowed after either terminal state.
///
/// This is the only component that mutates sessions. Expiry has no
/// background sweeper; it is detected lazily here (and by the evaluator,
/// which delegates the transition back to this type).
pub struct SessionLifecycle {
    assessments: Arc<dyn AssessmentStore>,
    sessions: Arc<dyn SessionStore>,
    ledger: Arc<dyn AttemptLedger>,
    events: Arc<dyn EventSink>,
}

impl SessionLifecycle {
    pub fn new(
        assessments: Arc<dyn AssessmentStore>,
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn AttemptLedger>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            assessments,
            sessions,
            ledger,
            events,
        }
    }

    /// Starts a new attempt. Returns the created session together with its
    /// countdown so the client can seed its timer.
    pub async fn start(
        &self,
        assessment_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(AssessmentSession, TimeLeft), EngineError> {
        let settings = self
            .load_settings(assessment_id, user_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        check_window(now, &settings)?;

        let mut used = self.ledger.count_attempts(assessment_id, user_id).await;
        if used >= settings.allowed_attempts {
            return Err(EngineError::AttemptsExhausted {
                used,
                allowed: settings.allowed_attempts,
            });
        }

        if let Some(active) = self.sessions.find_active(assessment_id, user_id).await? {
            let left = timing::time_left(
                now,
                active.started_at,
                settings.duration_minutes,
                settings.end_at,
            );
            if left.is_expired() {
                // The stale session consumed an attempt; the budget must be
                // re-checked before handing out a new one.
                self.finalize_expired(&active, now).await?;
                used += 1;
                if used >= settings.allowed_attempts {
                    return Err(EngineError::AttemptsExhausted {
                        used,
                        allowed: settings.allowed_attempts,
                    });
                }
            } else if active.resume_count >= 1
                && active.resume_count + 1 > settings.resume_limit
            {
                // Its resume budget is spent, so it can never be re-entered;
                // cancel it and free the learner for a fresh attempt.
                self.cancel(&active, now).await?;
            } else {
                return Err(EngineError::ActiveSessionExists {
                    session_id: Some(active.id),
                });
            }
        }

        match self
            .sessions
            .insert_active(assessment_id, user_id, now)
            .await?
        {
            SessionInsert::Created(session) => {
                self.events.emit(AttemptEvent::Started {
                    session_id: session.id,
                    assessment_id,
                    user_id,
                });
                let left = timing::time_left(
                    now,
                    session.started_at,
                    settings.duration_minutes,
                    settings.end_at,
                );
                Ok((session, left))
            }
            SessionInsert::Conflict => {
                // A concurrent duplicate start won the unique index. Surface
                // the winner's id so the client can offer to resume it.
                let winner = self.sessions.find_active(assessment_id, user_id).await?;
                Err(EngineError::ActiveSessionExists {
                    session_id: winner.map(|s| s.id),
                })
            }
        }
    }

    /// Re-enters an active attempt, spending one unit of the resume budget.
    pub async fn resume(
        &self,
        session_id: Uuid,
        assessment_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(AssessmentSession, TimeLeft), EngineError> {
        let session = self
            .sessions
            .find_owned(session_id, assessment_id, user_id)
            .await?
            .ok_or(EngineError::NotFound)?;
        let settings = self
            .load_settings(assessment_id, user_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        check_window(now, &settings)?;

        if !session.is_active() {
            return Err(EngineError::SessionNotActive);
        }

        let left = timing::time_left(
            now,
            session.started_at,
            settings.duration_minutes,
            settings.end_at,
        );
        if left.is_expired() {
            self.finalize_expired(&session, now).await?;
            return Err(EngineError::SessionNotActive);
        }

        let next = session.resume_count + 1;
        if next > settings.resume_limit {
            // Deliberately terminal: the session is cancelled rather than
            // left active, so a subsequent start can create a fresh attempt.
            self.cancel(&session, now).await?;
            return Err(EngineError::ResumeCountExceeded {
                limit: settings.resume_limit,
            });
        }

        let updated = self.sessions.record_resume(session.id, next, now).await?;
        self.events.emit(AttemptEvent::Resumed {
            session_id: updated.id,
            assessment_id,
            user_id,
            resume_count: updated.resume_count,
        });
        Ok((updated, left))
    }

    /// Completes an attempt and records its submission. Idempotent: a
    /// session already in a terminal state is returned unchanged so client
    /// retries observe the same result.
    pub async fn finish(
        &self,
        session_id: Uuid,
        assessment_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
        score: i64,
    ) -> Result<AssessmentSession, EngineError> {
        let session = self
            .sessions
            .find_owned(session_id, assessment_id, user_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        if !session.is_active() {
            return Ok(session);
        }

        match self
            .sessions
            .close(session.id, SessionStatus::Completed, now)
            .await?
        {
            Some(closed) => {
                self.ledger
                    .record_submission(assessment_id, user_id, score, false, now)
                    .await?;
                self.events.emit(AttemptEvent::Completed {
                    session_id: closed.id,
                    assessment_id,
                    user_id,
                    auto_submitted: false,
                });
                Ok(closed)
            }
            // Lost a race to another finish or to lazy expiry; whoever won
            // already recorded the submission. Return the terminal row.
            None => self
                .sessions
                .find_owned(session_id, assessment_id, user_id)
                .await?
                .ok_or(EngineError::NotFound),
        }
    }

    /// Finalizes a session whose timer ran out: completes it and
    /// auto-submits a zero-score attempt so abandonment still consumes one.
    /// The atomic close arbitrates concurrent expirers, so the submission
    /// is written exactly once.
    pub(crate) async fn finalize_expired(
        &self,
        session: &AssessmentSession,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if let Some(closed) = self
            .sessions
            .close(session.id, SessionStatus::Completed, now)
            .await?
        {
            let submission = self
                .ledger
                .record_submission(session.assessment_id, session.user_id, 0, true, now)
                .await?;
            tracing::info!(
                session_id = %closed.id,
                submission_id = submission.id,
                "attempt timer expired; auto-submitted"
            );
            self.events.emit(AttemptEvent::Completed {
                session_id: closed.id,
                assessment_id: session.assessment_id,
                user_id: session.user_id,
                auto_submitted: true,
            });
        }
        Ok(())
    }

    async fn cancel(
        &self,
        session: &AssessmentSession,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if let Some(closed) = self
            .sessions
            .close(session.id, SessionStatus::Cancelled, now)
            .await?
        {
            self.events.emit(AttemptEvent::Cancelled {
                session_id: closed.id,
                assessment_id: session.assessment_id,
                user_id: session.user_id,
            });
        }
        Ok(())
    }

    /// Resolved settings for the pair, or None for an unknown assessment.
    pub(crate) async fn load_settings(
        &self,
        assessment_id: i64,
        user_id: i64,
    ) -> Result<Option<EffectiveSettings>, EngineError> {
        let Some(assessment) = self.assessments.find_assessment(assessment_id).await? else {
            return Ok(None);
        };
        let override_row = self
            .assessments
            .find_override(assessment_id, user_id)
            .await?;
        Ok(Some(settings::resolve(&assessment, override_row.as_ref())))
    }
}

fn check_window(now: DateTime<Utc>, settings: &EffectiveSettings) -> Result<(), EngineError> {
    match timing::check_window(now, settings.start_at, settings.end_at) {
        WindowCheck::Open => Ok(()),
        WindowCheck::NotYetOpen(opens_at) => Err(EngineError::WindowNotOpen { opens_at }),
        WindowCheck::Closed(closed_at) => Err(EngineError::WindowClosed { closed_at }),
    }
}
