use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Submission;
use crate::db::types::SubmissionStatus;
use crate::grading::SubmittedAnswer;

pub(crate) const COLUMNS: &str = "\
    id, exam_id, student_id, answers, status, error, attempts, processing_started_at, \
    graded_at, created_at, updated_at";

/// Inserts a pending submission unless the student already has a live one for this exam.
///
/// The partial unique index on (student_id, exam_id) makes the check and the insert atomic;
/// rejected rows fall outside it.
pub(crate) async fn create_if_absent(
    pool: &PgPool,
    id: &str,
    exam_id: &str,
    student_id: &str,
    answers: &[SubmittedAnswer],
    now: PrimitiveDateTime,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "INSERT INTO submissions (
            id, exam_id, student_id, answers, status, attempts, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,0,$6,$6)
         ON CONFLICT (student_id, exam_id) WHERE status <> 'rejected' DO NOTHING
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(exam_id)
    .bind(student_id)
    .bind(Json(answers))
    .bind(SubmissionStatus::Pending)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("SELECT {COLUMNS} FROM submissions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn claim_next_pending(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "WITH candidate AS (
            SELECT id
            FROM submissions
            WHERE status = $1
            ORDER BY attempts, created_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        UPDATE submissions
        SET status = $2,
            processing_started_at = $3,
            attempts = attempts + 1,
            error = NULL,
            updated_at = $3
        FROM candidate
        WHERE submissions.id = candidate.id
        RETURNING submissions.id",
    )
    .bind(SubmissionStatus::Pending)
    .bind(SubmissionStatus::Processing)
    .bind(now)
    .fetch_optional(pool)
    .await
}

/// Moves a claimed submission to graded. Returns false when it is no longer processing.
pub(crate) async fn mark_graded(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions
         SET status = $1, error = NULL, graded_at = $2, updated_at = $2
         WHERE id = $3 AND status = $4",
    )
    .bind(SubmissionStatus::Graded)
    .bind(now)
    .bind(id)
    .bind(SubmissionStatus::Processing)
    .execute(executor)
    .await?;
    Ok(updated.rows_affected() > 0)
}

/// Moves a claimed submission to rejected. Returns false when it is no longer processing.
pub(crate) async fn mark_rejected(
    pool: &PgPool,
    id: &str,
    error: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions
         SET status = $1, error = $2, updated_at = $3
         WHERE id = $4 AND status = $5",
    )
    .bind(SubmissionStatus::Rejected)
    .bind(error)
    .bind(now)
    .bind(id)
    .bind(SubmissionStatus::Processing)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

/// Hands a submission back to the queue after an unexpected worker failure.
pub(crate) async fn release_to_pending(
    pool: &PgPool,
    id: &str,
    error: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE submissions
         SET status = $1, error = $2, processing_started_at = NULL, updated_at = $3
         WHERE id = $4 AND status = $5",
    )
    .bind(SubmissionStatus::Pending)
    .bind(error)
    .bind(now)
    .bind(id)
    .bind(SubmissionStatus::Processing)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn recover_stale_processing(
    pool: &PgPool,
    stale_before: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions
         SET status = $1, processing_started_at = NULL, updated_at = $2
         WHERE status = $3 AND processing_started_at < $4",
    )
    .bind(SubmissionStatus::Pending)
    .bind(now)
    .bind(SubmissionStatus::Processing)
    .bind(stale_before)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected())
}
