use thiserror::Error;

use crate::models::{SurveyRecord, SATISFACTION_COL, SURVEY_FIELD_COUNT};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("exactly 7 values required, you provided {actual}")]
    WrongArity { actual: usize },
    #[error("satisfaction must be a whole number, got {value:?}")]
    NonIntegerSatisfaction { value: String },
}

pub fn parse_satisfaction(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// Checks field count and that the satisfaction field is an integer. Nothing else
/// is enforced: any integer score and any text in the other fields is accepted.
pub fn validate<S: AsRef<str>>(fields: &[S]) -> Result<(), ValidationError> {
    if fields.len() != SURVEY_FIELD_COUNT {
        return Err(ValidationError::WrongArity {
            actual: fields.len(),
        });
    }

    let satisfaction = fields[SATISFACTION_COL].as_ref();
    if parse_satisfaction(satisfaction).is_none() {
        return Err(ValidationError::NonIntegerSatisfaction {
            value: satisfaction.to_string(),
        });
    }

    Ok(())
}

/// Builds a record from fields that passed [`validate`]. Runs the check again
/// and returns the same error on bad input.
pub fn coerce<S: AsRef<str>>(fields: &[S]) -> Result<SurveyRecord, ValidationError> {
    validate(fields)?;
    let text = |idx: usize| fields[idx].as_ref().to_string();
    let satisfaction = parse_satisfaction(fields[SATISFACTION_COL].as_ref()).ok_or_else(|| {
        ValidationError::NonIntegerSatisfaction {
            value: text(SATISFACTION_COL),
        }
    })?;

    Ok(SurveyRecord::new(
        text(0),
        text(1),
        text(2),
        satisfaction,
        text(4),
        text(5),
        text(6),
    ))
}
