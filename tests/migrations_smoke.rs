use sqlx::Row;

fn database_url() -> Option<String> {
    // Load .env so DATABASE_URL from .env is visible to the test binary.
    dotenvy::dotenv().ok();

    std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())
}

async fn connect() -> anyhow::Result<Option<sqlx::PgPool>> {
    let Some(database_url) = database_url() else {
        eprintln!("DATABASE_URL is not set; skipping database smoke test");
        return Ok(None);
    };

    let pool =
        sqlx::postgres::PgPoolOptions::new().max_connections(1).connect(&database_url).await?;

    let migrations_dir =
        std::env::var("EXAM_GRADER_MIGRATIONS_DIR").unwrap_or_else(|_| "migrations".to_string());
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(&migrations_dir)).await?;
    migrator.run(&pool).await?;

    Ok(Some(pool))
}

#[tokio::test]
async fn migrations_apply_and_tables_exist() -> anyhow::Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };

    for table in ["users", "questions", "exams", "submissions", "results"] {
        let row = sqlx::query("SELECT to_regclass($1)::text").bind(table).fetch_one(&pool).await?;
        let regclass: Option<String> = row.try_get(0)?;
        assert!(regclass.is_some(), "expected table {table} to exist after migrations");
    }

    Ok(())
}

#[tokio::test]
async fn results_are_unique_per_student_and_exam() -> anyhow::Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let student_id = format!("student_{suffix}");
    let exam_id = format!("exam_{suffix}");

    sqlx::query(
        "INSERT INTO users (id, name, email, role, is_deleted, created_at, updated_at)
         VALUES ($1, 'Smoke Student', $2, 'student', FALSE, NOW(), NOW())",
    )
    .bind(&student_id)
    .bind(format!("{suffix}@example.test"))
    .execute(&pool)
    .await?;

    sqlx::query(
        "INSERT INTO exams (id, title, question_ids, is_deleted, created_at, updated_at)
         VALUES ($1, 'Smoke Exam', ARRAY[]::text[], FALSE, NOW(), NOW())",
    )
    .bind(&exam_id)
    .execute(&pool)
    .await?;

    let mut inserted = Vec::new();
    for attempt in 0..2 {
        let submission_id = format!("sub_{suffix}_{attempt}");
        sqlx::query(
            "INSERT INTO submissions (id, exam_id, student_id, answers, status, attempts,
                                      created_at, updated_at)
             VALUES ($1, $2, $3, '[]'::jsonb, 'graded', 1, NOW(), NOW())
             ON CONFLICT (student_id, exam_id) WHERE status <> 'rejected' DO NOTHING",
        )
        .bind(&submission_id)
        .bind(&exam_id)
        .bind(&student_id)
        .execute(&pool)
        .await?;

        let result = sqlx::query(
            "INSERT INTO results (id, submission_id, exam_id, student_id, answers, total_score,
                                  max_score, passed, is_deleted, created_at)
             SELECT $1, id, exam_id, student_id, '[]'::jsonb, 1, 2, TRUE, FALSE, NOW()
             FROM submissions WHERE student_id = $2 AND exam_id = $3
             ON CONFLICT (student_id, exam_id) DO NOTHING",
        )
        .bind(format!("res_{suffix}_{attempt}"))
        .bind(&student_id)
        .bind(&exam_id)
        .execute(&pool)
        .await?;
        inserted.push(result.rows_affected());
    }

    assert_eq!(inserted, vec![1, 0], "second result for the same pair must be ignored");

    sqlx::query("DELETE FROM results WHERE exam_id = $1").bind(&exam_id).execute(&pool).await?;
    sqlx::query("DELETE FROM submissions WHERE exam_id = $1").bind(&exam_id).execute(&pool).await?;
    sqlx::query("DELETE FROM exams WHERE id = $1").bind(&exam_id).execute(&pool).await?;
    sqlx::query("DELETE FROM users WHERE id = $1").bind(&student_id).execute(&pool).await?;

    Ok(())
}

#[tokio::test]
async fn rejected_submission_does_not_block_a_new_one() -> anyhow::Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let student_id = format!("student_{suffix}");
    let exam_id = format!("exam_{suffix}");

    sqlx::query(
        "INSERT INTO users (id, name, email, role, is_deleted, created_at, updated_at)
         VALUES ($1, 'Retry Student', $2, 'student', FALSE, NOW(), NOW())",
    )
    .bind(&student_id)
    .bind(format!("{suffix}@example.test"))
    .execute(&pool)
    .await?;

    sqlx::query(
        "INSERT INTO exams (id, title, question_ids, is_deleted, created_at, updated_at)
         VALUES ($1, 'Retry Exam', ARRAY[]::text[], FALSE, NOW(), NOW())",
    )
    .bind(&exam_id)
    .execute(&pool)
    .await?;

    let mut inserted = Vec::new();
    for (attempt, status) in ["rejected", "pending", "pending"].into_iter().enumerate() {
        let result = sqlx::query(
            "INSERT INTO submissions (id, exam_id, student_id, answers, status, attempts,
                                      created_at, updated_at)
             VALUES ($1, $2, $3, '[]'::jsonb, $4::submissionstatus, 0, NOW(), NOW())
             ON CONFLICT (student_id, exam_id) WHERE status <> 'rejected' DO NOTHING",
        )
        .bind(format!("sub_{suffix}_{attempt}"))
        .bind(&exam_id)
        .bind(&student_id)
        .bind(status)
        .execute(&pool)
        .await?;
        inserted.push(result.rows_affected());
    }

    assert_eq!(inserted, vec![1, 1, 0], "only one live submission per student and exam");

    sqlx::query("DELETE FROM submissions WHERE exam_id = $1").bind(&exam_id).execute(&pool).await?;
    sqlx::query("DELETE FROM exams WHERE id = $1").bind(&exam_id).execute(&pool).await?;
    sqlx::query("DELETE FROM users WHERE id = $1").bind(&student_id).execute(&pool).await?;

    Ok(())
}
