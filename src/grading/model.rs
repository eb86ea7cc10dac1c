use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::GradingError;

/// Closed set of question kinds the engine knows how to grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "questiontype", rename_all = "kebab-case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    FillBlank,
    ShortAnswer,
    Matching,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single-choice",
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::TrueFalse => "true-false",
            QuestionType::FillBlank => "fill-blank",
            QuestionType::ShortAnswer => "short-answer",
            QuestionType::Matching => "matching",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single-choice" | "single" => Ok(QuestionType::SingleChoice),
            "multiple-choice" | "multiple" => Ok(QuestionType::MultipleChoice),
            "true-false" => Ok(QuestionType::TrueFalse),
            "fill-blank" => Ok(QuestionType::FillBlank),
            "short-answer" => Ok(QuestionType::ShortAnswer),
            "matching" => Ok(QuestionType::Matching),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

impl MatchPair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self { left: left.into(), right: right.into() }
    }
}

/// Reference data for a question. Each variant carries only the fields its type uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AnswerKey {
    SingleChoice { options: Vec<String>, correct_answers: Vec<String> },
    MultipleChoice { options: Vec<String>, correct_answers: Vec<String> },
    TrueFalse { options: Vec<String>, correct_answers: Vec<String> },
    FillBlank { blank_answer: String },
    ShortAnswer { keywords: Vec<String> },
    Matching { matching_pairs: Vec<MatchPair> },
}

impl AnswerKey {
    pub fn question_type(&self) -> QuestionType {
        match self {
            AnswerKey::SingleChoice { .. } => QuestionType::SingleChoice,
            AnswerKey::MultipleChoice { .. } => QuestionType::MultipleChoice,
            AnswerKey::TrueFalse { .. } => QuestionType::TrueFalse,
            AnswerKey::FillBlank { .. } => QuestionType::FillBlank,
            AnswerKey::ShortAnswer { .. } => QuestionType::ShortAnswer,
            AnswerKey::Matching { .. } => QuestionType::Matching,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub points: f64,
    #[serde(flatten)]
    pub key: AnswerKey,
}

impl Question {
    pub fn new(id: impl Into<String>, points: f64, key: AnswerKey) -> Self {
        Self { id: id.into(), points, key }
    }

    pub fn question_type(&self) -> QuestionType {
        self.key.question_type()
    }

    /// Checks the structural invariants grading relies on.
    pub fn validate(&self) -> Result<(), GradingError> {
        if !self.points.is_finite() || self.points <= 0.0 {
            return Err(self.invalid(format!("points must be positive, got {}", self.points)));
        }

        match &self.key {
            AnswerKey::SingleChoice { correct_answers, .. }
            | AnswerKey::TrueFalse { correct_answers, .. } => {
                if correct_answers.len() != 1 {
                    return Err(self.invalid(format!(
                        "expected exactly one correct answer, got {}",
                        correct_answers.len()
                    )));
                }
            }
            AnswerKey::MultipleChoice { correct_answers, .. } => {
                if correct_answers.is_empty() {
                    return Err(self.invalid("at least one correct answer is required".into()));
                }
            }
            AnswerKey::FillBlank { .. } => {}
            AnswerKey::ShortAnswer { keywords } => {
                if keywords.is_empty() {
                    return Err(self.invalid("at least one keyword is required".into()));
                }
            }
            AnswerKey::Matching { matching_pairs } => {
                if matching_pairs.is_empty() {
                    return Err(self.invalid("at least one matching pair is required".into()));
                }
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: String) -> GradingError {
        GradingError::InvalidQuestion { question_id: self.id.clone(), reason }
    }
}

/// The value a student submitted; its shape must fit the question type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selected {
    Text(String),
    Choices(Vec<String>),
    Pairs(Vec<MatchPair>),
}

impl Selected {
    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Selected::Text(_) => "text",
            Selected::Choices(_) => "list of strings",
            Selected::Pairs(_) => "list of pairs",
        }
    }

    pub(crate) fn as_text(&self) -> Option<&str> {
        match self {
            Selected::Text(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn as_choices(&self) -> Option<&[String]> {
        match self {
            Selected::Choices(values) => Some(values),
            _ => None,
        }
    }

    pub(crate) fn as_pairs(&self) -> Option<&[MatchPair]> {
        match self {
            Selected::Pairs(pairs) => Some(pairs),
            // `[]` deserializes as an empty string list.
            Selected::Choices(values) if values.is_empty() => Some(&[]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: String,
    pub selected: Selected,
}

impl SubmittedAnswer {
    pub fn new(question_id: impl Into<String>, selected: Selected) -> Self {
        Self { question_id: question_id.into(), selected }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub question_id: String,
    pub selected: Selected,
    pub is_correct: bool,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResult {
    pub answers: Vec<GradedAnswer>,
    pub total_score: f64,
    pub max_score: f64,
    pub passed: bool,
}

impl ExamResult {
    /// Score as a percentage of `max_score`; `None` for an exam worth no points.
    pub fn percentage(&self) -> Option<f64> {
        if self.max_score > 0.0 {
            Some(self.total_score / self.max_score * 100.0)
        } else {
            None
        }
    }

    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|answer| answer.is_correct).count()
    }
}
