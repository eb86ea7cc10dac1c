use thiserror::Error;

/// Failures that abort grading of a whole submission. No partial result is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradingError {
    #[error("question {question_id} is not part of this exam")]
    UnknownQuestion { question_id: String },
    #[error("question {question_id} was answered more than once")]
    DuplicateAnswer { question_id: String },
    #[error("answer for question {question_id} must be {expected}, got {actual}")]
    MalformedAnswer { question_id: String, expected: &'static str, actual: &'static str },
    #[error("question {question_id} is invalid: {reason}")]
    InvalidQuestion { question_id: String, reason: String },
}

impl GradingError {
    /// Whether the failure stems from the submitted payload rather than stored exam data.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, GradingError::InvalidQuestion { .. })
    }

    pub fn question_id(&self) -> &str {
        match self {
            GradingError::UnknownQuestion { question_id }
            | GradingError::DuplicateAnswer { question_id }
            | GradingError::MalformedAnswer { question_id, .. }
            | GradingError::InvalidQuestion { question_id, .. } => question_id,
        }
    }
}
