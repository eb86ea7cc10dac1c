use serde::Serialize;
use time::PrimitiveDateTime;

use crate::core::time::format_primitive;
use crate::db::models::ExamResultRow;
use crate::grading::ExamResult;

/// Student-facing summary of a graded exam.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamReport {
    pub title: String,
    pub exam_date: String,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub incorrect_answers: usize,
    pub total_score: f64,
    pub max_score: f64,
    pub accuracy: String,
    pub passed: bool,
    pub status: &'static str,
    pub message: String,
}

/// `question_count` is the exam's question count; unanswered questions count as incorrect.
pub fn build_report(
    title: &str,
    question_count: usize,
    result: &ExamResult,
    exam_date: PrimitiveDateTime,
) -> ExamReport {
    let correct_answers = result.correct_count();
    let accuracy = format!("{:.2}%", result.percentage().unwrap_or(0.0));
    let status = if result.passed { "Passed" } else { "Failed" };
    let verb = if result.passed { "passed" } else { "failed" };

    ExamReport {
        title: title.to_string(),
        exam_date: format_primitive(exam_date),
        total_questions: question_count,
        correct_answers,
        incorrect_answers: question_count.saturating_sub(correct_answers),
        total_score: result.total_score,
        max_score: result.max_score,
        message: format!("You {verb} '{title}' with {accuracy}."),
        accuracy,
        passed: result.passed,
        status,
    }
}

/// One student's line in an admin's per-exam result listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamResultEntry {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub exam_title: String,
    pub total_score: f64,
    pub max_score: f64,
    pub score: String,
    pub passed: bool,
    pub status: &'static str,
    pub exam_date: String,
}

fn percent_label(total_score: f64, max_score: f64) -> String {
    let percentage = if max_score > 0.0 { total_score / max_score * 100.0 } else { 0.0 };
    format!("{percentage:.2}%")
}

pub fn build_exam_results(exam_title: &str, rows: &[ExamResultRow]) -> Vec<ExamResultEntry> {
    rows.iter()
        .map(|row| ExamResultEntry {
            student_id: row.student_id.clone(),
            name: row.name.clone(),
            email: row.email.clone(),
            exam_title: exam_title.to_string(),
            total_score: row.total_score,
            max_score: row.max_score,
            score: percent_label(row.total_score, row.max_score),
            passed: row.passed,
            status: if row.passed { "Passed" } else { "Failed" },
            exam_date: format_primitive(row.created_at),
        })
        .collect()
}
