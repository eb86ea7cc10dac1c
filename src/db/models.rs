use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{QuestionType, SubmissionStatus, UserRole};
use crate::grading::{AnswerKey, ExamResult, GradedAnswer, Question, SubmittedAnswer};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_deleted: bool,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

/// A question-bank row; `answer_key` always matches `question_type`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionRecord {
    pub id: String,
    pub text: String,
    pub question_type: QuestionType,
    pub answer_key: Json<AnswerKey>,
    pub points: f64,
    pub allowed_time_seconds: i32,
    pub is_deleted: bool,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

impl QuestionRecord {
    pub fn to_question(&self) -> Question {
        Question::new(self.id.clone(), self.points, self.answer_key.0.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exam {
    pub id: String,
    pub title: String,
    pub question_ids: Vec<String>,
    pub assembly_seed: Option<i64>,
    pub versions: Json<Vec<ExamVersion>>,
    pub is_deleted: bool,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

/// Snapshot of an exam taken right before it was edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamVersion {
    pub recorded_at: String,
    pub title: String,
    pub question_ids: Vec<String>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub id: String,
    pub exam_id: String,
    pub student_id: String,
    pub answers: Json<Vec<SubmittedAnswer>>,
    pub status: SubmissionStatus,
    pub error: Option<String>,
    pub attempts: i32,
    pub processing_started_at: Option<PrimitiveDateTime>,
    pub graded_at: Option<PrimitiveDateTime>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResultRecord {
    pub id: String,
    pub submission_id: String,
    pub exam_id: String,
    pub student_id: String,
    pub answers: Json<Vec<GradedAnswer>>,
    pub total_score: f64,
    pub max_score: f64,
    pub passed: bool,
    pub is_deleted: bool,
    pub created_at: PrimitiveDateTime,
}

impl ResultRecord {
    pub fn to_exam_result(&self) -> ExamResult {
        ExamResult {
            answers: self.answers.0.clone(),
            total_score: self.total_score,
            max_score: self.max_score,
            passed: self.passed,
        }
    }
}

/// A stored result joined with its exam title, for per-student listings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentResultSummary {
    pub exam_id: String,
    pub title: String,
    pub total_score: f64,
    pub max_score: f64,
    pub passed: bool,
    pub created_at: PrimitiveDateTime,
}

/// A stored result joined with the student who earned it, for per-exam listings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamResultRow {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub total_score: f64,
    pub max_score: f64,
    pub passed: bool,
    pub created_at: PrimitiveDateTime,
}
