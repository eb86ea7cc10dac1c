use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::QuestionRecord;
use crate::grading::{AnswerKey, QuestionType};

pub(crate) const COLUMNS: &str = "\
    id, text, question_type, answer_key, points, allowed_time_seconds, is_deleted, \
    created_at, updated_at";

pub(crate) struct QuestionWrite<'a> {
    pub(crate) text: &'a str,
    pub(crate) answer_key: &'a AnswerKey,
    pub(crate) points: f64,
    pub(crate) allowed_time_seconds: i32,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: QuestionWrite<'_>,
) -> Result<QuestionRecord, sqlx::Error> {
    sqlx::query_as::<_, QuestionRecord>(&format!(
        "INSERT INTO questions (
            id, text, question_type, answer_key, points, allowed_time_seconds,
            is_deleted, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,FALSE,$7,$7)
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(params.text)
    .bind(params.answer_key.question_type())
    .bind(Json(params.answer_key))
    .bind(params.points)
    .bind(params.allowed_time_seconds)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: QuestionWrite<'_>,
) -> Result<Option<QuestionRecord>, sqlx::Error> {
    sqlx::query_as::<_, QuestionRecord>(&format!(
        "UPDATE questions
         SET text = $2,
             question_type = $3,
             answer_key = $4,
             points = $5,
             allowed_time_seconds = $6,
             updated_at = $7
         WHERE id = $1 AND is_deleted = FALSE
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(params.text)
    .bind(params.answer_key.question_type())
    .bind(Json(params.answer_key))
    .bind(params.points)
    .bind(params.allowed_time_seconds)
    .bind(params.now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn soft_delete(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE questions SET is_deleted = TRUE, updated_at = $2
         WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn find_active_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<QuestionRecord>, sqlx::Error> {
    sqlx::query_as::<_, QuestionRecord>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE id = $1 AND is_deleted = FALSE"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_active_by_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<QuestionRecord>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, QuestionRecord>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE id = ANY($1) AND is_deleted = FALSE"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_active(
    pool: &PgPool,
    question_type: Option<QuestionType>,
    search: Option<&str>,
) -> Result<Vec<QuestionRecord>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {COLUMNS} FROM questions WHERE is_deleted = FALSE"
    ));

    if let Some(question_type) = question_type {
        builder.push(" AND question_type = ");
        builder.push_bind(question_type);
    }
    if let Some(search) = search.map(str::trim).filter(|value| !value.is_empty()) {
        builder.push(" AND text ILIKE ");
        builder.push_bind(format!("%{search}%"));
    }

    builder.push(" ORDER BY created_at, id");
    builder.build_query_as::<QuestionRecord>().fetch_all(pool).await
}
