use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::{Exam, ExamVersion, User};
use crate::db::types::UserRole;
use crate::grading::Question;
use crate::repositories;
use crate::schemas::{AssemblyMode, ExamDraft};
use crate::services::result_report::{build_exam_results, ExamResultEntry};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("exam title must contain 1..=200 non-blank characters")]
    InvalidTitle,
    #[error("unknown or deleted questions: {}", .0.join(", "))]
    UnknownQuestions(Vec<String>),
    #[error("question {0} is listed more than once")]
    DuplicateQuestion(String),
    #[error("requested {requested} questions but only {available} are available")]
    NotEnoughQuestions { requested: usize, available: usize },
    #[error("an exam needs at least one question")]
    EmptySelection,
    #[error("selected questions are worth zero points in total")]
    ZeroPoints,
    #[error("only an active admin can manage exams")]
    Forbidden,
    #[error("exam not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Outcome of a selection; `seed` is set for random draws so they can be replayed.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub questions: Vec<Question>,
    pub seed: Option<u64>,
}

impl Selection {
    pub fn question_ids(&self) -> Vec<String> {
        self.questions.iter().map(|question| question.id.clone()).collect()
    }

    pub fn max_score(&self) -> f64 {
        self.questions.iter().map(|question| question.points).sum()
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of active exams plus the total matching the search.
#[derive(Debug, Clone, Serialize)]
pub struct ExamPage {
    pub exams: Vec<Exam>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

/// Pages are 1-based; `limit` is capped at `MAX_PAGE_SIZE`. Returns (page, limit, skip).
fn page_window(page: u32, limit: u32) -> (u32, u32, i64) {
    let page = page.max(1);
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    (page, limit, i64::from(page - 1) * i64::from(limit))
}

/// Picks the exam's questions out of `bank`, the active question bank or the relevant part of it.
pub fn select_questions(
    bank: &[Question],
    mode: &AssemblyMode,
) -> Result<Selection, AssemblyError> {
    let selection = match mode {
        AssemblyMode::Fixed { question_ids } => select_fixed(bank, question_ids)?,
        AssemblyMode::Random { count, question_type, seed } => {
            let mut candidates: Vec<&Question> = bank
                .iter()
                .filter(|question| question_type.map_or(true, |t| question.question_type() == t))
                .collect();
            if *count == 0 {
                return Err(AssemblyError::EmptySelection);
            }
            if candidates.len() < *count {
                return Err(AssemblyError::NotEnoughQuestions {
                    requested: *count,
                    available: candidates.len(),
                });
            }

            // Stable input order keeps a seed reproducible whatever order the bank was loaded in.
            candidates.sort_by(|a, b| a.id.cmp(&b.id));
            let seed = seed.unwrap_or_else(rand::random);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut questions: Vec<Question> = candidates
                .choose_multiple(&mut rng, *count)
                .map(|&question| question.clone())
                .collect();
            questions.shuffle(&mut rng);

            Selection { questions, seed: Some(seed) }
        }
    };

    if selection.questions.is_empty() {
        return Err(AssemblyError::EmptySelection);
    }
    if selection.max_score() <= 0.0 {
        return Err(AssemblyError::ZeroPoints);
    }
    Ok(selection)
}

fn select_fixed(bank: &[Question], question_ids: &[String]) -> Result<Selection, AssemblyError> {
    let by_id: HashMap<&str, &Question> =
        bank.iter().map(|question| (question.id.as_str(), question)).collect();

    let mut seen = HashSet::new();
    let mut missing = Vec::new();
    let mut questions = Vec::with_capacity(question_ids.len());
    for id in question_ids {
        if !seen.insert(id.as_str()) {
            return Err(AssemblyError::DuplicateQuestion(id.clone()));
        }
        match by_id.get(id.as_str()) {
            Some(question) => questions.push((*question).clone()),
            None => missing.push(id.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(AssemblyError::UnknownQuestions(missing));
    }
    Ok(Selection { questions, seed: None })
}

fn normalized_title(draft: &ExamDraft) -> Result<String, AssemblyError> {
    draft.validate().map_err(|_| AssemblyError::InvalidTitle)?;
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(AssemblyError::InvalidTitle);
    }
    Ok(title.to_string())
}

async fn require_admin(pool: &PgPool, admin_id: &str) -> Result<User, AssemblyError> {
    match repositories::users::find_active_by_id(pool, admin_id).await? {
        Some(user) if user.role == UserRole::Admin => Ok(user),
        _ => Err(AssemblyError::Forbidden),
    }
}

async fn load_bank(pool: &PgPool, mode: &AssemblyMode) -> Result<Vec<Question>, sqlx::Error> {
    let records = match mode {
        AssemblyMode::Fixed { question_ids } => {
            repositories::questions::list_active_by_ids(pool, question_ids).await?
        }
        AssemblyMode::Random { question_type, .. } => {
            repositories::questions::list_active(pool, *question_type, None).await?
        }
    };
    Ok(records.iter().map(|record| record.to_question()).collect())
}

pub async fn create_exam(
    pool: &PgPool,
    admin_id: &str,
    draft: ExamDraft,
) -> Result<Exam, AssemblyError> {
    let title = normalized_title(&draft)?;
    let admin = require_admin(pool, admin_id).await?;

    let bank = load_bank(pool, &draft.mode).await?;
    let selection = select_questions(&bank, &draft.mode)?;
    let question_ids = selection.question_ids();

    let exam_id = Uuid::new_v4().to_string();
    let exam = repositories::exams::create(
        pool,
        repositories::exams::CreateExam {
            id: &exam_id,
            title: &title,
            question_ids: &question_ids,
            // Stored bit-for-bit; read back with `as u64`.
            assembly_seed: selection.seed.map(|seed| seed as i64),
            created_by: &admin.id,
            now: primitive_now_utc(),
        },
    )
    .await?;

    tracing::info!(
        exam_id = %exam.id,
        admin_id = %admin.id,
        questions = question_ids.len(),
        max_score = selection.max_score(),
        seed = ?selection.seed,
        "Exam assembled"
    );
    Ok(exam)
}

/// Rebuilds the exam from a new draft and records its previous state in `versions`.
pub async fn update_exam(
    pool: &PgPool,
    admin_id: &str,
    exam_id: &str,
    draft: ExamDraft,
) -> Result<Exam, AssemblyError> {
    let title = normalized_title(&draft)?;
    let admin = require_admin(pool, admin_id).await?;

    let current = repositories::exams::find_active_by_id(pool, exam_id)
        .await?
        .ok_or(AssemblyError::NotFound)?;

    let bank = load_bank(pool, &draft.mode).await?;
    let selection = select_questions(&bank, &draft.mode)?;
    let question_ids = selection.question_ids();

    let now = primitive_now_utc();
    let previous = ExamVersion {
        recorded_at: format_primitive(now),
        title: current.title.clone(),
        question_ids: current.question_ids.clone(),
        updated_by: current.updated_by.clone(),
    };

    let exam = repositories::exams::update_with_version(
        pool,
        exam_id,
        repositories::exams::UpdateExam {
            title: &title,
            question_ids: &question_ids,
            updated_by: &admin.id,
            previous: &previous,
            now,
        },
    )
    .await?
    .ok_or(AssemblyError::NotFound)?;

    tracing::info!(
        exam_id = %exam.id,
        admin_id = %admin.id,
        versions = exam.versions.0.len(),
        "Exam updated"
    );
    Ok(exam)
}

/// Soft-deletes the exam together with every result recorded for it.
pub async fn soft_delete_exam(
    pool: &PgPool,
    admin_id: &str,
    exam_id: &str,
) -> Result<(), AssemblyError> {
    require_admin(pool, admin_id).await?;

    let mut tx = pool.begin().await?;
    if !repositories::exams::soft_delete(&mut *tx, exam_id, primitive_now_utc()).await? {
        return Err(AssemblyError::NotFound);
    }
    let results = repositories::results::soft_delete_by_exam(&mut *tx, exam_id).await?;
    tx.commit().await?;

    tracing::info!(exam_id = %exam_id, results_deleted = results, "Exam deleted");
    Ok(())
}

pub async fn get_exam(pool: &PgPool, exam_id: &str) -> Result<Exam, AssemblyError> {
    repositories::exams::find_active_by_id(pool, exam_id).await?.ok_or(AssemblyError::NotFound)
}

/// Active exams, newest first, optionally filtered by a title substring.
pub async fn list_exams(
    pool: &PgPool,
    search: Option<&str>,
    page: u32,
    limit: u32,
) -> Result<ExamPage, AssemblyError> {
    let (page, limit, skip) = page_window(page, limit);
    let exams = repositories::exams::list_active(pool, search, skip, i64::from(limit)).await?;
    let total = repositories::exams::count_active(pool, search).await?;
    Ok(ExamPage { exams, page, limit, total })
}

/// Every active result for the exam with the student's name and email, for admins.
pub async fn list_exam_results(
    pool: &PgPool,
    admin_id: &str,
    exam_id: &str,
) -> Result<Vec<ExamResultEntry>, AssemblyError> {
    require_admin(pool, admin_id).await?;
    let exam = get_exam(pool, exam_id).await?;
    let rows = repositories::results::list_for_exam(pool, exam_id).await?;
    Ok(build_exam_results(&exam.title, &rows))
}

/// The exam's active questions in exam order; deleted bank entries are skipped.
pub async fn load_exam_questions(pool: &PgPool, exam: &Exam) -> Result<Vec<Question>, sqlx::Error> {
    let records = repositories::questions::list_active_by_ids(pool, &exam.question_ids).await?;
    let mut by_id: HashMap<String, Question> =
        records.iter().map(|record| (record.id.clone(), record.to_question())).collect();

    let questions: Vec<Question> =
        exam.question_ids.iter().filter_map(|id| by_id.remove(id)).collect();
    if questions.len() < exam.question_ids.len() {
        tracing::warn!(
            exam_id = %exam.id,
            listed = exam.question_ids.len(),
            active = questions.len(),
            "Exam references deleted questions"
        );
    }
    Ok(questions)
}
