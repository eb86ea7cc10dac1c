use serde::{Deserialize, Serialize};
use sqlx::Type;

pub use crate::grading::QuestionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "submissionstatus", rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Processing,
    Graded,
    Rejected,
}
