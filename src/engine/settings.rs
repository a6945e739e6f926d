// src/engine/settings.rs

use crate::models::assessment::{Assessment, AssessmentOverride};

pub const DEFAULT_ALLOWED_ATTEMPTS: i64 = 1;
pub const DEFAULT_RESUME_LIMIT: i64 = 0;

/// Timing and attempt rules after merging assessment defaults with an
/// optional per-learner override. Derived on every request, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub allowed_attempts: i64,
    pub resume_limit: i64,
    pub start_at: Option<chrono::DateTime<chrono::Utc>>,
    pub end_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_minutes: Option<i64>,
    pub allowed_languages: Option<Vec<String>>,
}

/// Field-by-field precedence: override value if present, else assessment
/// value if present, else engine default. The attempt length always comes
/// from the assessment; overrides cannot change it.
pub fn resolve(
    assessment: &Assessment,
    override_row: Option<&AssessmentOverride>,
) -> EffectiveSettings {
    EffectiveSettings {
        allowed_attempts: override_row
            .and_then(|o| o.max_attempts)
            .or(assessment.allowed_attempts)
            .unwrap_or(DEFAULT_ALLOWED_ATTEMPTS),
        resume_limit: override_row
            .and_then(|o| o.resume_limit)
            .or(assessment.resume_limit)
            .unwrap_or(DEFAULT_RESUME_LIMIT),
        start_at: override_row.and_then(|o| o.start_at).or(assessment.start_at),
        end_at: override_row.and_then(|o| o.end_at).or(assessment.end_at),
        duration_minutes: assessment.duration_minutes,
        allowed_languages: override_row
            .and_then(|o| o.allowed_languages.as_ref())
            .or(assessment.allowed_languages.as_ref())
            .map(|j| j.0.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn base_assessment() -> Assessment {
        Assessment {
            id: 1,
            title: "Intro exam".to_string(),
            description: None,
            duration_minutes: Some(60),
            start_at: None,
            end_at: None,
            allowed_attempts: Some(3),
            resume_limit: Some(2),
            allowed_languages: Some(Json(vec!["python".to_string()])),
            created_at: None,
        }
    }

    fn empty_override() -> AssessmentOverride {
        AssessmentOverride {
            id: 1,
            assessment_id: 1,
            user_id: 7,
            max_attempts: None,
            resume_limit: None,
            start_at: None,
            end_at: None,
            allowed_languages: None,
            created_at: None,
        }
    }

    #[test]
    fn assessment_values_win_over_engine_defaults() {
        let settings = resolve(&base_assessment(), None);
        assert_eq!(settings.allowed_attempts, 3);
        assert_eq!(settings.resume_limit, 2);
        assert_eq!(settings.duration_minutes, Some(60));
        assert_eq!(settings.allowed_languages, Some(vec!["python".to_string()]));
    }

    #[test]
    fn engine_defaults_apply_when_everything_is_null() {
        let mut assessment = base_assessment();
        assessment.allowed_attempts = None;
        assessment.resume_limit = None;
        assessment.duration_minutes = None;
        assessment.allowed_languages = None;

        let settings = resolve(&assessment, None);
        assert_eq!(settings.allowed_attempts, DEFAULT_ALLOWED_ATTEMPTS);
        assert_eq!(settings.resume_limit, DEFAULT_RESUME_LIMIT);
        assert_eq!(settings.duration_minutes, None);
        assert_eq!(settings.allowed_languages, None);
    }

    #[test]
    fn override_fields_win_field_by_field() {
        let mut ovr = empty_override();
        ovr.max_attempts = Some(5);
        ovr.allowed_languages = Some(Json(vec!["rust".to_string()]));

        let settings = resolve(&base_assessment(), Some(&ovr));
        assert_eq!(settings.allowed_attempts, 5);
        // Fields the override leaves null keep the assessment value.
        assert_eq!(settings.resume_limit, 2);
        assert_eq!(settings.allowed_languages, Some(vec!["rust".to_string()]));
    }

    #[test]
    fn duration_always_comes_from_the_assessment() {
        // Overrides carry no duration field at all; make sure the merge
        // still reports the assessment's.
        let ovr = empty_override();
        let settings = resolve(&base_assessment(), Some(&ovr));
        assert_eq!(settings.duration_minutes, Some(60));
    }
}
