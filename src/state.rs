// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::engine::eligibility::EligibilityEvaluator;
use crate::engine::lifecycle::SessionLifecycle;
use crate::engine::store::{AssessmentStore, AttemptLedger, SessionStore};
use crate::events::EventSink;

#[derive(Clone)]
pub struct AppState {
    pub evaluator: Arc<EligibilityEvaluator>,
    pub lifecycle: Arc<SessionLifecycle>,
    pub assessments: Arc<dyn AssessmentStore>,
    pub config: Config,
}

impl AppState {
    /// Wires the engine over whichever store implementations the caller
    /// provides: Postgres in `main`, in-memory in the test suites.
    pub fn new(
        assessments: Arc<dyn AssessmentStore>,
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn AttemptLedger>,
        events: Arc<dyn EventSink>,
        config: Config,
    ) -> Self {
        let lifecycle = Arc::new(SessionLifecycle::new(
            assessments.clone(),
            sessions.clone(),
            ledger.clone(),
            events,
        ));
        let evaluator = Arc::new(EligibilityEvaluator::new(
            assessments.clone(),
            sessions,
            ledger,
            lifecycle.clone(),
        ));
        Self {
            evaluator,
            lifecycle,
            assessments,
            config,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
