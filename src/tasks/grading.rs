use anyhow::{Context, Result};
use time::Duration;

use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc as now_primitive, seconds_between};
use crate::db::types::SubmissionStatus;
use crate::grading::grade_submission;
use crate::repositories;
use crate::services::exam_assembly;

/// Submissions that keep crashing the worker are rejected after this many claims.
pub(crate) const MAX_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GradeOutcome {
    Graded,
    Rejected,
    Skipped,
}

impl GradeOutcome {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            GradeOutcome::Graded => "graded",
            GradeOutcome::Rejected => "rejected",
            GradeOutcome::Skipped => "skipped",
        }
    }
}

pub(crate) async fn claim_next_submission(state: &AppState) -> Result<Option<String>> {
    repositories::submissions::claim_next_pending(state.db(), now_primitive())
        .await
        .context("Failed to claim submission")
}

pub(crate) async fn grade_claimed_submission(
    state: &AppState,
    submission_id: &str,
) -> Result<GradeOutcome> {
    let submission = repositories::submissions::find_by_id(state.db(), submission_id)
        .await
        .context("Failed to fetch submission")?
        .context("Submission not found")?;

    if submission.status != SubmissionStatus::Processing {
        tracing::info!(submission_id, status = ?submission.status, "Skipping grading");
        return Ok(GradeOutcome::Skipped);
    }

    if submission.attempts > MAX_ATTEMPTS {
        return reject(state, submission_id, &format!("gave up after {MAX_ATTEMPTS} attempts"))
            .await;
    }

    let started_at = submission.processing_started_at.unwrap_or_else(now_primitive);
    metrics::histogram!("grading_queue_latency_seconds")
        .record(seconds_between(submission.created_at, started_at).max(0.0));

    let Some(exam) = repositories::exams::find_active_by_id(state.db(), &submission.exam_id)
        .await
        .context("Failed to fetch exam")?
    else {
        return reject(state, submission_id, "exam not found or deleted").await;
    };

    let questions = exam_assembly::load_exam_questions(state.db(), &exam)
        .await
        .context("Failed to load exam questions")?;

    let policy = state.settings().pass_policy();
    let result = match grade_submission(&questions, &submission.answers.0, &policy) {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(
                submission_id,
                exam_id = %exam.id,
                student_id = %submission.student_id,
                client_error = err.is_client_error(),
                error = %err,
                "Submission cannot be graded"
            );
            return reject(state, submission_id, &err.to_string()).await;
        }
    };

    let completed_at = now_primitive();
    let result_id = uuid::Uuid::new_v4().to_string();

    let mut tx = state.db().begin().await.context("Failed to begin grading transaction")?;
    let inserted = repositories::results::insert_if_absent(
        &mut *tx,
        repositories::results::InsertResult {
            id: &result_id,
            submission_id: &submission.id,
            exam_id: &submission.exam_id,
            student_id: &submission.student_id,
            result: &result,
            now: completed_at,
        },
    )
    .await
    .context("Failed to store result")?;

    if !inserted {
        tx.rollback().await.context("Failed to roll back grading transaction")?;
        return reject(state, submission_id, "a result is already recorded for this exam").await;
    }

    let marked = repositories::submissions::mark_graded(&mut *tx, &submission.id, completed_at)
        .await
        .context("Failed to mark submission graded")?;
    if !marked {
        // Stale recovery handed the submission to another worker; its claim wins.
        tx.rollback().await.context("Failed to roll back grading transaction")?;
        tracing::warn!(submission_id, "Submission no longer processing, result discarded");
        return Ok(GradeOutcome::Skipped);
    }
    tx.commit().await.context("Failed to commit grading transaction")?;

    metrics::counter!("grading_jobs_total", "status" => "graded").increment(1);
    metrics::histogram!("grading_duration_seconds")
        .record(seconds_between(started_at, completed_at).max(0.0));

    tracing::info!(
        submission_id,
        exam_id = %submission.exam_id,
        student_id = %submission.student_id,
        total_score = result.total_score,
        max_score = result.max_score,
        passed = result.passed,
        "Submission graded"
    );

    Ok(GradeOutcome::Graded)
}

async fn reject(state: &AppState, submission_id: &str, reason: &str) -> Result<GradeOutcome> {
    let marked =
        repositories::submissions::mark_rejected(state.db(), submission_id, reason, now_primitive())
            .await
            .context("Failed to mark submission rejected")?;
    if !marked {
        tracing::warn!(submission_id, reason, "Submission no longer processing, not rejected");
        return Ok(GradeOutcome::Skipped);
    }
    metrics::counter!("grading_jobs_total", "status" => "rejected").increment(1);
    tracing::info!(submission_id, reason, "Submission rejected");
    Ok(GradeOutcome::Rejected)
}

/// Puts a submission back in the queue after the worker failed on it unexpectedly.
pub(crate) async fn recover_submission_on_unexpected_error(
    state: &AppState,
    submission_id: &str,
    error: &str,
) -> Result<()> {
    metrics::counter!("grading_jobs_total", "status" => "failed").increment(1);
    repositories::submissions::release_to_pending(state.db(), submission_id, error, now_primitive())
        .await
        .context("Failed to release submission")
}

pub(crate) async fn recover_stale_submissions(state: &AppState) -> Result<u64> {
    let now = now_primitive();
    let stale_before = now - Duration::minutes(state.settings().grading().stale_after_minutes);

    let recovered =
        repositories::submissions::recover_stale_processing(state.db(), stale_before, now)
            .await
            .context("Failed to recover stale submissions")?;
    if recovered > 0 {
        tracing::warn!(recovered, "Returned stale processing submissions to the queue");
    }
    Ok(recovered)
}
