use std::sync::{Mutex, MutexGuard, OnceLock};

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::{config::Settings, state::AppState};
use crate::db::models::{Exam, QuestionRecord, User};
use crate::db::types::{SubmissionStatus, UserRole};
use crate::grading::AnswerKey;
use crate::repositories;
use crate::schemas::{AssemblyMode, ExamDraft, NewQuestion};
use crate::services::{exam_assembly, question_bank};

/// Serializes tests that read or rewrite the process environment.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn load_settings() -> Option<Settings> {
    let _guard = env_lock();
    // Load .env so DATABASE_URL from .env is visible to the test binary.
    dotenvy::dotenv().ok();

    let configured =
        std::env::var("DATABASE_URL").ok().is_some_and(|url| !url.trim().is_empty());
    if !configured {
        eprintln!("DATABASE_URL is not set; skipping database test");
        return None;
    }
    Some(Settings::load().expect("settings"))
}

/// A migrated pool wrapped in worker state, or `None` when no database is configured.
///
/// Fixtures use fresh ids, so tests share the database without truncating it.
pub(crate) async fn state() -> Option<AppState> {
    let settings = load_settings()?;
    let db = crate::db::init_pool(&settings).await.expect("db pool");
    crate::db::run_migrations(&db).await.expect("migrations");
    Some(AppState::new(settings, db))
}

pub(crate) async fn insert_user(pool: &PgPool, role: UserRole) -> User {
    let id = Uuid::new_v4().to_string();
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, name, email, role, is_deleted, created_at, updated_at)
         VALUES ($1, $2, $3, $4, FALSE, NOW(), NOW())
         RETURNING {}",
        repositories::users::COLUMNS
    ))
    .bind(&id)
    .bind(format!("User {id}"))
    .bind(format!("{id}@school.test"))
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("insert user")
}

pub(crate) async fn insert_fill_blank(pool: &PgPool, answer: &str, points: f64) -> QuestionRecord {
    question_bank::create_question(
        pool,
        NewQuestion {
            text: format!("Fill in: {answer}"),
            points,
            allowed_time_seconds: 60,
            answer_key: AnswerKey::FillBlank { blank_answer: answer.to_string() },
        },
    )
    .await
    .expect("insert question")
}

pub(crate) async fn create_fixed_exam(
    pool: &PgPool,
    admin_id: &str,
    title: &str,
    question_ids: &[&str],
) -> Exam {
    let mode = AssemblyMode::Fixed {
        question_ids: question_ids.iter().map(|id| id.to_string()).collect(),
    };
    exam_assembly::create_exam(pool, admin_id, ExamDraft::new(title, mode))
        .await
        .expect("create exam")
}

/// Claims one specific submission the way the queue would, without racing other tests.
pub(crate) async fn claim(pool: &PgPool, submission_id: &str) {
    sqlx::query(
        "UPDATE submissions
         SET status = $1, processing_started_at = NOW(), attempts = attempts + 1,
             error = NULL, updated_at = NOW()
         WHERE id = $2 AND status = $3",
    )
    .bind(SubmissionStatus::Processing)
    .bind(submission_id)
    .bind(SubmissionStatus::Pending)
    .execute(pool)
    .await
    .expect("claim submission");
}
