pub mod cli;
pub mod core;
pub mod db;
pub mod grading;
pub(crate) mod repositories;
pub mod schemas;
pub mod services;
pub(crate) mod tasks;
#[cfg(test)]
mod test_support;

use anyhow::Context;

use crate::cli::Command;
use crate::core::{config::Settings, state::AppState, telemetry};

/// Loads configuration, sets up logging and metrics, and returns a migrated pool.
async fn bootstrap(install_metrics: bool) -> anyhow::Result<(Settings, sqlx::PgPool)> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    if install_metrics {
        core::metrics::init(&settings)?;
    }

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    Ok((settings, db_pool))
}

pub async fn run() -> anyhow::Result<()> {
    let command = cli::parse_args(std::env::args().skip(1))
        .map_err(|err| anyhow::anyhow!("{err}\n{}", cli::USAGE))?;

    match command {
        Command::Worker => run_worker().await,
        Command::ImportQuestions { path } => {
            let (_, db_pool) = bootstrap(false).await?;
            let summary = services::question_bank::import_from_file(&db_pool, &path).await?;
            println!("imported {} question(s) from {}", summary.imported_items, path.display());
            Ok(())
        }
        Command::AssembleExam { admin_id, draft } => {
            let (_, db_pool) = bootstrap(false).await?;
            let exam = services::exam_assembly::create_exam(&db_pool, &admin_id, draft)
                .await
                .context("Failed to assemble exam")?;
            println!("{}", serde_json::to_string_pretty(&exam)?);
            Ok(())
        }
        Command::ListExams { search, page, limit } => {
            let (_, db_pool) = bootstrap(false).await?;
            let listing =
                services::exam_assembly::list_exams(&db_pool, search.as_deref(), page, limit)
                    .await
                    .context("Failed to list exams")?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
            Ok(())
        }
        Command::ExamResults { admin_id, exam_id } => {
            let (_, db_pool) = bootstrap(false).await?;
            let results =
                services::exam_assembly::list_exam_results(&db_pool, &admin_id, &exam_id)
                    .await
                    .context("Failed to list exam results")?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
    }
}

pub async fn run_worker() -> anyhow::Result<()> {
    let (settings, db_pool) = bootstrap(true).await?;

    tracing::info!(
        environment = %settings.runtime().environment.as_str(),
        pass_threshold_percent = settings.grading().pass_threshold_percent,
        "Exam grader starting"
    );

    let state = AppState::new(settings, db_pool);
    tasks::scheduler::run(state).await
}
