// src/engine/mod.rs
//
// The attempt lifecycle and eligibility engine. Everything here is wired by
// plain constructor injection: the evaluator and the lifecycle receive the
// store traits they depend on and share no other state.

pub mod eligibility;
pub mod lifecycle;
pub mod memory;
pub mod postgres;
pub mod settings;
pub mod store;
pub mod timing;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Business-rule failures of the attempt engine.
///
/// Every variant except `Store` is an expected, typed outcome returned to
/// the caller. `Store` is the only one that surfaces as a 5xx.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Unknown assessment or session, or a session not owned by the caller.
    /// The cases are indistinguishable so probing cannot confirm existence.
    #[error("assessment or session not found")]
    NotFound,

    #[error("the assessment opens at {opens_at}")]
    WindowNotOpen { opens_at: DateTime<Utc> },

    #[error("the assessment closed at {closed_at}")]
    WindowClosed { closed_at: DateTime<Utc> },

    #[error("no attempts remaining ({used} of {allowed} used)")]
    AttemptsExhausted { used: i64, allowed: i64 },

    /// Carries the conflicting session id so the client can offer to resume
    /// instead. The id can be missing on a lost concurrent-start race.
    #[error("an attempt is already in progress")]
    ActiveSessionExists { session_id: Option<Uuid> },

    /// The session was cancelled as a side effect of this failure.
    #[error("resume limit of {limit} exceeded; the attempt has been cancelled")]
    ResumeCountExceeded { limit: i64 },

    #[error("the session is no longer active")]
    SessionNotActive,

    #[error("datastore failure: {0}")]
    Store(String),
}

impl EngineError {
    /// Machine-readable code, aligned with the eligibility reason names.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::WindowNotOpen { .. } => "before_start",
            Self::WindowClosed { .. } => "after_end",
            Self::AttemptsExhausted { .. } => "attempts_exhausted",
            Self::ActiveSessionExists { .. } => "active_session_exists",
            Self::ResumeCountExceeded { .. } => "resume_count_exceeded",
            Self::SessionNotActive => "session_not_active",
            Self::Store(_) => "store_failure",
        }
    }
}
