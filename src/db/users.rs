//! Database queries for users.

use async_trait::async_trait;

use super::{DbError, SqliteStore};
use crate::db::pool::DbPool;
use crate::models::User;
use crate::services::directory::UserDirectory;

/// Check whether a user row exists.
pub async fn user_exists(pool: &DbPool, user_id: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(found.is_some())
}

/// Set a user's active flag, returning the updated user if it exists.
pub async fn set_user_active(
    pool: &DbPool,
    user_id: &str,
    is_active: bool,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET is_active = ?
        WHERE user_id = ?
        RETURNING user_id, username, team_name, is_active
        "#,
    )
    .bind(is_active)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn exists(&self, user_id: &str) -> Result<bool, DbError> {
        Ok(user_exists(self.pool(), user_id).await?)
    }
}
