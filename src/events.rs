// src/events.rs

use uuid::Uuid;

/// Notification emitted after a session state change.
///
/// Strictly one-way: the lifecycle fires these after the store write and
/// never waits on, or reads anything back from, the sink.
#[derive(Debug, Clone)]
pub enum AttemptEvent {
    Started {
        session_id: Uuid,
        assessment_id: i64,
        user_id: i64,
    },
    Resumed {
        session_id: Uuid,
        assessment_id: i64,
        user_id: i64,
        resume_count: i64,
    },
    Completed {
        session_id: Uuid,
        assessment_id: i64,
        user_id: i64,
        /// True when lazy expiry completed the attempt.
        auto_submitted: bool,
    },
    Cancelled {
        session_id: Uuid,
        assessment_id: i64,
        user_id: i64,
    },
}

/// Fan-out target for attempt events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AttemptEvent);
}

/// Default sink: a structured log line, picked up by whatever ships logs
/// downstream.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: AttemptEvent) {
        tracing::info!(?event, "attempt event");
    }
}
