use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::grading::QuestionType;

/// How an exam's question list is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AssemblyMode {
    /// Explicit question ids, kept in the given order.
    Fixed { question_ids: Vec<String> },
    /// `count` distinct questions drawn from the active bank.
    Random {
        count: usize,
        #[serde(default)]
        question_type: Option<QuestionType>,
        #[serde(default)]
        seed: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ExamDraft {
    #[validate(length(min = 1, max = 200, message = "title must contain 1..=200 characters"))]
    pub title: String,
    #[serde(flatten)]
    pub mode: AssemblyMode,
}

impl ExamDraft {
    pub fn new(title: impl Into<String>, mode: AssemblyMode) -> Self {
        Self { title: title.into(), mode }
    }
}
