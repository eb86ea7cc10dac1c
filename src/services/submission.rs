use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{ResultRecord, StudentResultSummary, Submission};
use crate::db::types::UserRole;
use crate::grading::{grade_submission, GradingError, PassPolicy, Question, SubmittedAnswer};
use crate::repositories;
use crate::services::exam_assembly;
use crate::services::result_report::{build_report, ExamReport};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("exam already submitted")]
    AlreadySubmitted,
    #[error("submission rejected: {0}")]
    Rejected(#[from] GradingError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

async fn require_student(pool: &PgPool, student_id: &str) -> Result<(), SubmitError> {
    match repositories::users::find_active_by_id(pool, student_id).await? {
        Some(user) if user.role == UserRole::Student => Ok(()),
        Some(_) => Err(SubmitError::Forbidden("only students can submit exams")),
        None => Err(SubmitError::NotFound("student")),
    }
}

/// Runs the grading checks against the exam as it stands; the score itself is discarded.
fn check_answers(questions: &[Question], answers: &[SubmittedAnswer]) -> Result<(), GradingError> {
    grade_submission(questions, answers, &PassPolicy::default()).map(|_| ())
}

/// Queues a submission for grading. A student gets one live submission per exam; answers that
/// cannot be graded are refused here and nothing is stored.
pub async fn enqueue_submission(
    pool: &PgPool,
    student_id: &str,
    exam_id: &str,
    answers: Vec<SubmittedAnswer>,
) -> Result<Submission, SubmitError> {
    require_student(pool, student_id).await?;
    let exam = repositories::exams::find_active_by_id(pool, exam_id)
        .await?
        .ok_or(SubmitError::NotFound("exam"))?;

    let questions = exam_assembly::load_exam_questions(pool, &exam).await?;
    if let Err(err) = check_answers(&questions, &answers) {
        metrics::counter!("submissions_refused_total").increment(1);
        tracing::info!(
            exam_id = %exam_id,
            student_id = %student_id,
            question_id = %err.question_id(),
            error = %err,
            "Submission refused at intake"
        );
        return Err(err.into());
    }

    let submission_id = Uuid::new_v4().to_string();
    let submission = repositories::submissions::create_if_absent(
        pool,
        &submission_id,
        exam_id,
        student_id,
        &answers,
        primitive_now_utc(),
    )
    .await?
    .ok_or(SubmitError::AlreadySubmitted)?;

    metrics::counter!("submissions_enqueued_total").increment(1);
    tracing::info!(
        submission_id = %submission.id,
        exam_id = %exam_id,
        student_id = %student_id,
        answers = answers.len(),
        "Submission queued for grading"
    );
    Ok(submission)
}

pub async fn find_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Option<Submission>, SubmitError> {
    Ok(repositories::submissions::find_by_id(pool, submission_id).await?)
}

pub async fn find_result(
    pool: &PgPool,
    student_id: &str,
    exam_id: &str,
) -> Result<Option<ResultRecord>, SubmitError> {
    Ok(repositories::results::find_for_student(pool, student_id, exam_id).await?)
}

pub async fn list_student_results(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<StudentResultSummary>, SubmitError> {
    require_student(pool, student_id).await?;
    Ok(repositories::results::list_for_student(pool, student_id).await?)
}

/// Report for a stored result, computed against the exam's current question list.
pub async fn student_report(
    pool: &PgPool,
    student_id: &str,
    exam_id: &str,
) -> Result<ExamReport, SubmitError> {
    require_student(pool, student_id).await?;
    let exam = repositories::exams::find_active_by_id(pool, exam_id)
        .await?
        .ok_or(SubmitError::NotFound("exam"))?;
    let result = repositories::results::find_for_student(pool, student_id, exam_id)
        .await?
        .ok_or(SubmitError::NotFound("result"))?;

    let questions = exam_assembly::load_exam_questions(pool, &exam).await?;
    Ok(build_report(&exam.title, questions.len(), &result.to_exam_result(), result.created_at))
}
