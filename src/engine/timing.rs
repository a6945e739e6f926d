// src/engine/timing.rs

use chrono::{DateTime, Duration, Utc};

/// Countdown state for an attempt.
///
/// The three cases are deliberately distinct: `0` is never reused to mean
/// both "no timer" and "time's up". An assessment with neither a duration
/// nor an end bound is `Unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeLeft {
    Unbounded,
    /// Whole seconds remaining, always > 0.
    Remaining(i64),
    Expired,
}

impl TimeLeft {
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }

    /// Wire form: `None` = no countdown, `Some(0)` = expired.
    pub fn remaining_seconds(&self) -> Option<i64> {
        match self {
            Self::Unbounded => None,
            Self::Remaining(secs) => Some(*secs),
            Self::Expired => Some(0),
        }
    }
}

/// Computes how much time an attempt started at `started_at` has left at
/// `now`. Two bounds can apply: the attempt duration and the assessment's
/// end-of-window; the tighter one wins.
pub fn time_left(
    now: DateTime<Utc>,
    started_at: DateTime<Utc>,
    duration_minutes: Option<i64>,
    end_at: Option<DateTime<Utc>>,
) -> TimeLeft {
    let mut deadline: Option<DateTime<Utc>> = None;

    if let Some(minutes) = duration_minutes {
        if minutes > 0 {
            deadline = Some(started_at + Duration::minutes(minutes));
        }
    }
    if let Some(end) = end_at {
        deadline = Some(match deadline {
            Some(d) => d.min(end),
            None => end,
        });
    }

    match deadline {
        None => TimeLeft::Unbounded,
        Some(d) => {
            // num_seconds truncates, so a sub-second remainder reads as 0.
            let secs = (d - now).num_seconds();
            if secs <= 0 {
                TimeLeft::Expired
            } else {
                TimeLeft::Remaining(secs)
            }
        }
    }
}

/// Result of checking `now` against the `[start_at, end_at]` window.
/// Both bounds are inclusive; a missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCheck {
    Open,
    /// Carries the boundary so messages can name it.
    NotYetOpen(DateTime<Utc>),
    Closed(DateTime<Utc>),
}

pub fn check_window(
    now: DateTime<Utc>,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
) -> WindowCheck {
    if let Some(start) = start_at {
        if now < start {
            return WindowCheck::NotYetOpen(start);
        }
    }
    if let Some(end) = end_at {
        if now > end {
            return WindowCheck::Closed(end);
        }
    }
    WindowCheck::Open
}
