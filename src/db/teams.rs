//! Database queries for teams and their members.

use async_trait::async_trait;

use super::{DbError, SqliteStore};
use crate::db::pool::DbPool;
use crate::models::{Team, TeamMember};
use crate::services::directory::TeamDirectory;

/// Create a team and upsert its members in one transaction.
///
/// Members that already exist move to this team and take the submitted
/// name and active flag.
pub async fn insert_team(pool: &DbPool, team: &Team) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO teams (team_name) VALUES (?)")
        .bind(&team.team_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from_insert(e, format!("team {}", team.team_name)))?;

    for member in &team.members {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, team_name, is_active)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                username = excluded.username,
                team_name = excluded.team_name,
                is_active = excluded.is_active
            "#,
        )
        .bind(&member.user_id)
        .bind(&member.username)
        .bind(&team.team_name)
        .bind(member.is_active)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Get a team with its members ordered by user id.
pub async fn get_team(pool: &DbPool, team_name: &str) -> Result<Option<Team>, sqlx::Error> {
    let exists: Option<String> =
        sqlx::query_scalar("SELECT team_name FROM teams WHERE team_name = ?")
            .bind(team_name)
            .fetch_optional(pool)
            .await?;

    let Some(team_name) = exists else {
        return Ok(None);
    };

    let members = sqlx::query_as::<_, TeamMember>(
        r#"
        SELECT user_id, username, is_active
        FROM users
        WHERE team_name = ?
        ORDER BY user_id
        "#,
    )
    .bind(&team_name)
    .fetch_all(pool)
    .await?;

    Ok(Some(Team { team_name, members }))
}

/// Ids of active members sharing `user_id`'s team, excluding `user_id`.
pub async fn get_active_teammates(pool: &DbPool, user_id: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT u.user_id
        FROM users u
        WHERE u.team_name = (SELECT team_name FROM users WHERE user_id = ?)
          AND u.user_id != ?
          AND u.is_active = 1
        ORDER BY u.user_id
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
}

#[async_trait]
impl TeamDirectory for SqliteStore {
    async fn active_teammates(&self, user_id: &str) -> Result<Vec<String>, DbError> {
        Ok(get_active_teammates(self.pool(), user_id).await?)
    }

    async fn is_team_member(&self, user_id: &str) -> Result<bool, DbError> {
        // Every stored user carries a team, so membership is existence.
        let team: Option<String> =
            sqlx::query_scalar("SELECT team_name FROM users WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(team.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::initialize;
    use tempfile::tempdir;

    fn member(id: &str, active: bool) -> TeamMember {
        TeamMember {
            user_id: id.into(),
            username: format!("name-{}", id),
            is_active: active,
        }
    }

    fn team(name: &str, members: Vec<TeamMember>) -> Team {
        Team {
            team_name: name.into(),
            members,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_team() {
        let dir = tempdir().unwrap();
        let pool = initialize(&dir.path().join("test.db"), 1).await.unwrap();

        let backend = team("backend", vec![member("u2", true), member("u1", false)]);
        insert_team(&pool, &backend).await.unwrap();

        let loaded = get_team(&pool, "backend").await.unwrap().unwrap();
        assert_eq!(loaded.team_name, "backend");
        assert_eq!(loaded.members, vec![member("u1", false), member("u2", true)]);

        assert!(get_team(&pool, "frontend").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_team_is_rejected_without_side_effects() {
        let dir = tempdir().unwrap();
        let pool = initialize(&dir.path().join("test.db"), 1).await.unwrap();

        insert_team(&pool, &team("backend", vec![member("u1", true)]))
            .await
            .unwrap();

        let err = insert_team(&pool, &team("backend", vec![member("u9", true)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Duplicate(_)));

        let loaded = get_team(&pool, "backend").await.unwrap().unwrap();
        assert_eq!(loaded.members.len(), 1);
    }

    #[tokio::test]
    async fn test_member_moves_to_new_team() {
        let dir = tempdir().unwrap();
        let pool = initialize(&dir.path().join("test.db"), 1).await.unwrap();

        insert_team(&pool, &team("backend", vec![member("u1", true), member("u2", true)]))
            .await
            .unwrap();
        insert_team(&pool, &team("frontend", vec![member("u2", false)]))
            .await
            .unwrap();

        let backend = get_team(&pool, "backend").await.unwrap().unwrap();
        assert_eq!(backend.members, vec![member("u1", true)]);

        let frontend = get_team(&pool, "frontend").await.unwrap().unwrap();
        assert_eq!(frontend.members, vec![member("u2", false)]);
    }

    #[tokio::test]
    async fn test_active_teammates_excludes_self_and_inactive() {
        let dir = tempdir().unwrap();
        let pool = initialize(&dir.path().join("test.db"), 1).await.unwrap();

        insert_team(
            &pool,
            &team(
                "backend",
                vec![
                    member("a", true),
                    member("b", true),
                    member("c", false),
                    member("d", true),
                ],
            ),
        )
        .await
        .unwrap();
        insert_team(&pool, &team("other", vec![member("x", true)]))
            .await
            .unwrap();

        let store = SqliteStore::new(pool);
        assert_eq!(store.active_teammates("a").await.unwrap(), vec!["b", "d"]);
        assert_eq!(store.active_teammates("x").await.unwrap(), Vec::<String>::new());
        assert_eq!(store.active_teammates("ghost").await.unwrap(), Vec::<String>::new());

        assert!(store.is_team_member("c").await.unwrap());
        assert!(!store.is_team_member("ghost").await.unwrap());
    }
}
