use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::{Exam, ExamVersion};

pub(crate) const COLUMNS: &str = "\
    id, title, question_ids, assembly_seed, versions, is_deleted, created_by, updated_by, \
    created_at, updated_at";

pub(crate) struct CreateExam<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) question_ids: &'a [String],
    pub(crate) assembly_seed: Option<i64>,
    pub(crate) created_by: &'a str,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateExam<'_>) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, title, question_ids, assembly_seed, versions, is_deleted,
            created_by, updated_by, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,'[]'::jsonb,FALSE,$5,$5,$6,$6)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.question_ids)
    .bind(params.assembly_seed)
    .bind(params.created_by)
    .bind(params.now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_active_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE id = $1 AND is_deleted = FALSE"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

fn push_active_filter(builder: &mut QueryBuilder<'_, Postgres>, search: Option<&str>) {
    builder.push(" WHERE is_deleted = FALSE");
    if let Some(search) = search.map(str::trim).filter(|value| !value.is_empty()) {
        builder.push(" AND title ILIKE ");
        builder.push_bind(format!("%{search}%"));
    }
}

pub(crate) async fn list_active(
    pool: &PgPool,
    search: Option<&str>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Exam>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM exams"));
    push_active_filter(&mut builder, search);
    builder.push(" ORDER BY created_at DESC, id");
    builder.push(" OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<Exam>().fetch_all(pool).await
}

pub(crate) async fn count_active(pool: &PgPool, search: Option<&str>) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM exams");
    push_active_filter(&mut builder, search);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) struct UpdateExam<'a> {
    pub(crate) title: &'a str,
    pub(crate) question_ids: &'a [String],
    pub(crate) updated_by: &'a str,
    pub(crate) previous: &'a ExamVersion,
    pub(crate) now: PrimitiveDateTime,
}

/// Applies the edit and appends the previous state to the version history in one statement.
pub(crate) async fn update_with_version(
    pool: &PgPool,
    id: &str,
    params: UpdateExam<'_>,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "UPDATE exams
         SET title = $2,
             question_ids = $3,
             updated_by = $4,
             versions = versions || jsonb_build_array($5::jsonb),
             updated_at = $6
         WHERE id = $1 AND is_deleted = FALSE
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(params.title)
    .bind(params.question_ids)
    .bind(params.updated_by)
    .bind(Json(params.previous))
    .bind(params.now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn soft_delete(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE exams SET is_deleted = TRUE, updated_at = $2
         WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(updated.rows_affected() > 0)
}
