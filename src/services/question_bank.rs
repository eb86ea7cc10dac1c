use std::path::Path;

use anyhow::{anyhow, Context};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::core::time::primitive_now_utc;
use crate::db::models::QuestionRecord;
use crate::grading::QuestionType;
use crate::repositories;
use crate::schemas::NewQuestion;

#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("invalid question: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("question not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported_items: usize,
}

fn write_params(payload: &NewQuestion) -> repositories::questions::QuestionWrite<'_> {
    repositories::questions::QuestionWrite {
        text: payload.text.trim(),
        answer_key: &payload.answer_key,
        points: payload.points,
        allowed_time_seconds: payload.allowed_time_seconds,
        now: primitive_now_utc(),
    }
}

pub async fn create_question(
    pool: &PgPool,
    payload: NewQuestion,
) -> Result<QuestionRecord, QuestionBankError> {
    payload.validate()?;

    let id = Uuid::new_v4().to_string();
    let record = repositories::questions::insert(pool, &id, write_params(&payload)).await?;

    tracing::info!(
        question_id = %record.id,
        question_type = %record.question_type,
        "Question created"
    );
    Ok(record)
}

pub async fn update_question(
    pool: &PgPool,
    id: &str,
    payload: NewQuestion,
) -> Result<QuestionRecord, QuestionBankError> {
    payload.validate()?;

    let record = repositories::questions::update(pool, id, write_params(&payload))
        .await?
        .ok_or(QuestionBankError::NotFound)?;

    tracing::info!(question_id = %record.id, "Question updated");
    Ok(record)
}

/// Hides the question from the bank. Exams that already reference it stop grading it.
pub async fn soft_delete_question(pool: &PgPool, id: &str) -> Result<(), QuestionBankError> {
    if !repositories::questions::soft_delete(pool, id, primitive_now_utc()).await? {
        return Err(QuestionBankError::NotFound);
    }
    tracing::info!(question_id = %id, "Question deleted");
    Ok(())
}

pub async fn get_question(pool: &PgPool, id: &str) -> Result<QuestionRecord, QuestionBankError> {
    repositories::questions::find_active_by_id(pool, id).await?.ok_or(QuestionBankError::NotFound)
}

pub async fn list_questions(
    pool: &PgPool,
    question_type: Option<QuestionType>,
    search: Option<&str>,
) -> Result<Vec<QuestionRecord>, QuestionBankError> {
    Ok(repositories::questions::list_active(pool, question_type, search).await?)
}

/// Parses a JSON array of questions and checks every item before anything is written.
pub fn parse_import(raw: &str) -> anyhow::Result<Vec<NewQuestion>> {
    let items: Vec<NewQuestion> =
        serde_json::from_str(raw).context("question bank json has invalid format")?;
    if items.is_empty() {
        return Err(anyhow!("question bank file contains no questions"));
    }

    for (index, item) in items.iter().enumerate() {
        item.validate().map_err(|err| anyhow!("question #{} is invalid: {err}", index + 1))?;
    }
    Ok(items)
}

pub async fn import_from_file(pool: &PgPool, path: &Path) -> anyhow::Result<ImportSummary> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read question bank json: {}", path.display()))?;
    let items = parse_import(&raw)?;

    let mut tx = pool.begin().await.context("failed to begin import transaction")?;

    let mut imported_items = 0usize;
    for (index, item) in items.iter().enumerate() {
        let id = Uuid::new_v4().to_string();
        repositories::questions::insert(&mut *tx, &id, write_params(item))
            .await
            .with_context(|| format!("failed to insert question #{}", index + 1))?;
        imported_items += 1;
    }

    tx.commit().await.context("failed to commit question bank import transaction")?;

    metrics::counter!("question_bank_import_items_total").increment(imported_items as u64);
    tracing::info!(path = %path.display(), imported_items, "Question bank imported");

    Ok(ImportSummary { imported_items })
}
