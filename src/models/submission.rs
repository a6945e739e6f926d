// src/models/submission.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// Represents the 'submissions' table: one immutable row per completed or
/// auto-submitted attempt. The engine only ever counts these.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub assessment_id: i64,
    pub user_id: i64,
    pub score: i64,
    /// True when the row was written by lazy expiry rather than an explicit
    /// finish call.
    pub auto_submitted: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
