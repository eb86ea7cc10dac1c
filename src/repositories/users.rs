use sqlx::PgPool;

use crate::db::models::User;

pub(crate) const COLUMNS: &str = "id, name, email, role, is_deleted, created_at, updated_at";

pub(crate) async fn find_active_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE id = $1 AND is_deleted = FALSE"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
