use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{ExamResultRow, ResultRecord, StudentResultSummary};
use crate::grading::ExamResult;

pub(crate) const COLUMNS: &str = "\
    id, submission_id, exam_id, student_id, answers, total_score, max_score, passed, \
    is_deleted, created_at";

pub(crate) struct InsertResult<'a> {
    pub(crate) id: &'a str,
    pub(crate) submission_id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) result: &'a ExamResult,
    pub(crate) now: PrimitiveDateTime,
}

/// Returns `false` when a result for the same (student, exam) pair already exists.
pub(crate) async fn insert_if_absent(
    executor: impl sqlx::PgExecutor<'_>,
    params: InsertResult<'_>,
) -> Result<bool, sqlx::Error> {
    let inserted = sqlx::query(
        "INSERT INTO results (
            id, submission_id, exam_id, student_id, answers, total_score, max_score,
            passed, is_deleted, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,FALSE,$9)
         ON CONFLICT (student_id, exam_id) DO NOTHING",
    )
    .bind(params.id)
    .bind(params.submission_id)
    .bind(params.exam_id)
    .bind(params.student_id)
    .bind(Json(&params.result.answers))
    .bind(params.result.total_score)
    .bind(params.result.max_score)
    .bind(params.result.passed)
    .bind(params.now)
    .execute(executor)
    .await?;
    Ok(inserted.rows_affected() > 0)
}

pub(crate) async fn find_for_student(
    pool: &PgPool,
    student_id: &str,
    exam_id: &str,
) -> Result<Option<ResultRecord>, sqlx::Error> {
    sqlx::query_as::<_, ResultRecord>(&format!(
        "SELECT {COLUMNS}
         FROM results
         WHERE student_id = $1 AND exam_id = $2 AND is_deleted = FALSE"
    ))
    .bind(student_id)
    .bind(exam_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<StudentResultSummary>, sqlx::Error> {
    sqlx::query_as::<_, StudentResultSummary>(
        "SELECT r.exam_id, e.title, r.total_score, r.max_score, r.passed, r.created_at
         FROM results r
         JOIN exams e ON e.id = r.exam_id
         WHERE r.student_id = $1 AND r.is_deleted = FALSE
         ORDER BY r.created_at DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_for_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<ExamResultRow>, sqlx::Error> {
    sqlx::query_as::<_, ExamResultRow>(
        "SELECT r.student_id, u.name, u.email, r.total_score, r.max_score, r.passed, r.created_at
         FROM results r
         JOIN users u ON u.id = r.student_id
         WHERE r.exam_id = $1 AND r.is_deleted = FALSE
         ORDER BY r.created_at, r.student_id",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn soft_delete_by_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<u64, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE results SET is_deleted = TRUE WHERE exam_id = $1 AND is_deleted = FALSE",
    )
    .bind(exam_id)
    .execute(executor)
    .await?;
    Ok(updated.rows_affected())
}
