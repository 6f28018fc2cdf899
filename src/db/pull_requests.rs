//! Database queries for pull requests and their reviewer slots.
//!
//! Reviewers live in `pr_reviewers`, one row per slot. Reassignment
//! rewrites a single slot row in place so that concurrent changes to the
//! other slot are never clobbered.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::{DbError, SqliteStore};
use crate::db::pool::DbPool;
use crate::models::{PullRequest, PullRequestShort, PullRequestStatus, ReviewerSet};
use crate::services::directory::PullRequestStore;

/// Raw `pull_requests` row; timestamps are Unix seconds.
#[derive(Debug, FromRow)]
struct PullRequestRow {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    is_merged: bool,
    created_at: i64,
    merged_at: Option<i64>,
}

#[derive(Debug, FromRow)]
struct PullRequestShortRow {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    is_merged: bool,
}

impl From<PullRequestShortRow> for PullRequestShort {
    fn from(row: PullRequestShortRow) -> Self {
        Self {
            pull_request_id: row.pull_request_id,
            pull_request_name: row.pull_request_name,
            author_id: row.author_id,
            status: PullRequestStatus::from_merged(row.is_merged),
        }
    }
}

fn from_unix(secs: i64, column: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| DbError::Corrupt(format!("{} out of range: {}", column, secs)))
}

impl PullRequestRow {
    fn into_model(self, reviewers: Vec<String>) -> Result<PullRequest, DbError> {
        let assigned_reviewers = ReviewerSet::try_from(reviewers).map_err(|e| {
            DbError::Corrupt(format!("reviewers of {}: {}", self.pull_request_id, e))
        })?;
        let merged_at = self
            .merged_at
            .map(|secs| from_unix(secs, "merged_at"))
            .transpose()?;

        Ok(PullRequest {
            status: PullRequestStatus::from_merged(self.is_merged),
            created_at: from_unix(self.created_at, "created_at")?,
            merged_at,
            pull_request_id: self.pull_request_id,
            pull_request_name: self.pull_request_name,
            author_id: self.author_id,
            assigned_reviewers,
        })
    }
}

const SELECT_PR_COLUMNS: &str =
    "pull_request_id, pull_request_name, author_id, is_merged, created_at, merged_at";

async fn fetch_reviewers<'e, E>(executor: E, pr_id: &str) -> Result<Vec<String>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_scalar("SELECT user_id FROM pr_reviewers WHERE pull_request_id = ? ORDER BY slot")
        .bind(pr_id)
        .fetch_all(executor)
        .await
}

/// Insert a pull request and one `pr_reviewers` row per slot.
pub async fn insert_pull_request(pool: &DbPool, pr: &PullRequest) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO pull_requests (pull_request_id, pull_request_name, author_id, is_merged, created_at, merged_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&pr.pull_request_id)
    .bind(&pr.pull_request_name)
    .bind(&pr.author_id)
    .bind(pr.is_merged())
    .bind(pr.created_at.timestamp())
    .bind(pr.merged_at.map(|t| t.timestamp()))
    .execute(&mut *tx)
    .await
    .map_err(|e| DbError::from_insert(e, format!("pull request {}", pr.pull_request_id)))?;

    for (slot, reviewer) in pr.assigned_reviewers.iter().enumerate() {
        sqlx::query("INSERT INTO pr_reviewers (pull_request_id, slot, user_id) VALUES (?, ?, ?)")
            .bind(&pr.pull_request_id)
            .bind(slot as i64)
            .bind(reviewer)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Get a pull request with reviewers in slot order.
pub async fn get_pull_request(pool: &DbPool, pr_id: &str) -> Result<Option<PullRequest>, DbError> {
    let mut tx = pool.begin().await?;

    let row: Option<PullRequestRow> = sqlx::query_as(&format!(
        "SELECT {} FROM pull_requests WHERE pull_request_id = ?",
        SELECT_PR_COLUMNS
    ))
    .bind(pr_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let reviewers = fetch_reviewers(&mut *tx, pr_id).await?;
    tx.commit().await?;

    row.into_model(reviewers).map(Some)
}

/// Whether `user_id` holds a reviewer slot on `pr_id`.
pub async fn reviewer_assigned(pool: &DbPool, pr_id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM pr_reviewers WHERE pull_request_id = ? AND user_id = ? LIMIT 1",
    )
    .bind(pr_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// Rewrite the slot held by `old_user_id`, only while the PR is open.
///
/// Returns whether a row changed. A unique violation means `new_user_id`
/// took the other slot concurrently, which also counts as no change.
pub async fn replace_reviewer_slot(
    pool: &DbPool,
    pr_id: &str,
    old_user_id: &str,
    new_user_id: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        r#"
        UPDATE pr_reviewers
        SET user_id = ?
        WHERE pull_request_id = ?
          AND user_id = ?
          AND EXISTS (
              SELECT 1 FROM pull_requests pr
              WHERE pr.pull_request_id = pr_reviewers.pull_request_id AND pr.is_merged = 0
          )
        "#,
    )
    .bind(new_user_id)
    .bind(pr_id)
    .bind(old_user_id)
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(done.rows_affected() == 1),
        Err(e) => match DbError::from_insert(e, "reviewer slot") {
            DbError::Duplicate(_) => Ok(false),
            other => Err(other),
        },
    }
}

/// Mark a pull request merged. `merged_at` is only set the first time.
pub async fn set_merged(
    pool: &DbPool,
    pr_id: &str,
    merged_at: DateTime<Utc>,
) -> Result<Option<PullRequest>, DbError> {
    let mut tx = pool.begin().await?;

    let row: Option<PullRequestRow> = sqlx::query_as(&format!(
        r#"
        UPDATE pull_requests
        SET is_merged = 1, merged_at = COALESCE(merged_at, ?)
        WHERE pull_request_id = ?
        RETURNING {}
        "#,
        SELECT_PR_COLUMNS
    ))
    .bind(merged_at.timestamp())
    .bind(pr_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let reviewers = fetch_reviewers(&mut *tx, pr_id).await?;
    tx.commit().await?;

    row.into_model(reviewers).map(Some)
}

/// Pull requests on which `user_id` currently holds a reviewer slot.
pub async fn get_review_requests(
    pool: &DbPool,
    user_id: &str,
) -> Result<Vec<PullRequestShort>, sqlx::Error> {
    let rows: Vec<PullRequestShortRow> = sqlx::query_as(
        r#"
        SELECT pr.pull_request_id, pr.pull_request_name, pr.author_id, pr.is_merged
        FROM pull_requests pr
        JOIN pr_reviewers r ON r.pull_request_id = pr.pull_request_id
        WHERE r.user_id = ?
        ORDER BY pr.created_at, pr.pull_request_id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(PullRequestShort::from).collect())
}

#[async_trait]
impl PullRequestStore for SqliteStore {
    async fn insert(&self, pr: &PullRequest) -> Result<(), DbError> {
        insert_pull_request(self.pool(), pr).await
    }

    async fn get_by_id(&self, pr_id: &str) -> Result<Option<PullRequest>, DbError> {
        get_pull_request(self.pool(), pr_id).await
    }

    async fn is_reviewer_assigned(&self, pr_id: &str, user_id: &str) -> Result<bool, DbError> {
        Ok(reviewer_assigned(self.pool(), pr_id, user_id).await?)
    }

    async fn replace_reviewer(
        &self,
        pr_id: &str,
        old_user_id: &str,
        new_user_id: &str,
    ) -> Result<bool, DbError> {
        replace_reviewer_slot(self.pool(), pr_id, old_user_id, new_user_id).await
    }

    async fn mark_merged(&self, pr_id: &str) -> Result<Option<PullRequest>, DbError> {
        set_merged(self.pool(), pr_id, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::initialize;
    use crate::db::teams::insert_team;
    use crate::models::{Team, TeamMember};
    use chrono::TimeZone;
    use tempfile::tempdir;

    async fn setup(dir: &std::path::Path) -> DbPool {
        let pool = initialize(&dir.join("test.db"), 2).await.unwrap();
        let members = ["alice", "bob", "carol", "dave"]
            .into_iter()
            .map(|id| TeamMember {
                user_id: id.into(),
                username: id.to_uppercase(),
                is_active: true,
            })
            .collect();
        insert_team(
            &pool,
            &Team {
                team_name: "core".into(),
                members,
            },
        )
        .await
        .unwrap();
        pool
    }

    fn pr(id: &str, reviewers: &[&str]) -> PullRequest {
        PullRequest {
            pull_request_id: id.into(),
            pull_request_name: format!("PR {}", id),
            author_id: "carol".into(),
            status: PullRequestStatus::Open,
            assigned_reviewers: ReviewerSet::try_from(
                reviewers.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
            )
            .unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            merged_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let dir = tempdir().unwrap();
        let pool = setup(dir.path()).await;

        let original = pr("pr-1", &["bob", "alice"]);
        insert_pull_request(&pool, &original).await.unwrap();

        let loaded = get_pull_request(&pool, "pr-1").await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(get_pull_request(&pool, "pr-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert() {
        let dir = tempdir().unwrap();
        let pool = setup(dir.path()).await;

        insert_pull_request(&pool, &pr("pr-1", &["bob"])).await.unwrap();
        let err = insert_pull_request(&pool, &pr("pr-1", &["alice"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Duplicate(_)));

        // The failed insert left the original slots alone.
        let loaded = get_pull_request(&pool, "pr-1").await.unwrap().unwrap();
        assert_eq!(loaded.assigned_reviewers.as_slice(), ["bob"]);
    }

    #[tokio::test]
    async fn test_replace_targets_single_slot() {
        let dir = tempdir().unwrap();
        let pool = setup(dir.path()).await;
        insert_pull_request(&pool, &pr("pr-1", &["alice", "bob"]))
            .await
            .unwrap();

        assert!(replace_reviewer_slot(&pool, "pr-1", "bob", "dave").await.unwrap());

        let loaded = get_pull_request(&pool, "pr-1").await.unwrap().unwrap();
        assert_eq!(loaded.assigned_reviewers.as_slice(), ["alice", "dave"]);
        assert!(!reviewer_assigned(&pool, "pr-1", "bob").await.unwrap());
        assert!(reviewer_assigned(&pool, "pr-1", "dave").await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_lost_race_changes_nothing() {
        let dir = tempdir().unwrap();
        let pool = setup(dir.path()).await;
        insert_pull_request(&pool, &pr("pr-1", &["alice", "bob"]))
            .await
            .unwrap();

        assert!(replace_reviewer_slot(&pool, "pr-1", "bob", "dave").await.unwrap());
        // Second caller still targets bob's old slot.
        assert!(!replace_reviewer_slot(&pool, "pr-1", "bob", "carol").await.unwrap());
        // Moving alice onto dave's slot would duplicate a reviewer.
        assert!(!replace_reviewer_slot(&pool, "pr-1", "alice", "dave").await.unwrap());

        let loaded = get_pull_request(&pool, "pr-1").await.unwrap().unwrap();
        assert_eq!(loaded.assigned_reviewers.as_slice(), ["alice", "dave"]);
    }

    #[tokio::test]
    async fn test_replace_refused_after_merge() {
        let dir = tempdir().unwrap();
        let pool = setup(dir.path()).await;
        insert_pull_request(&pool, &pr("pr-1", &["bob"])).await.unwrap();
        set_merged(&pool, "pr-1", Utc::now()).await.unwrap();

        assert!(!replace_reviewer_slot(&pool, "pr-1", "bob", "dave").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_merged_is_idempotent() {
        let dir = tempdir().unwrap();
        let pool = setup(dir.path()).await;
        insert_pull_request(&pool, &pr("pr-1", &["bob"])).await.unwrap();

        let first_at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let merged = set_merged(&pool, "pr-1", first_at).await.unwrap().unwrap();
        assert_eq!(merged.status, PullRequestStatus::Merged);
        assert_eq!(merged.merged_at, Some(first_at));
        assert_eq!(merged.assigned_reviewers.as_slice(), ["bob"]);

        let later = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let again = set_merged(&pool, "pr-1", later).await.unwrap().unwrap();
        assert_eq!(again, merged);

        assert!(set_merged(&pool, "missing", later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_review_requests() {
        let dir = tempdir().unwrap();
        let pool = setup(dir.path()).await;
        insert_pull_request(&pool, &pr("pr-1", &["alice", "bob"]))
            .await
            .unwrap();
        insert_pull_request(&pool, &pr("pr-2", &["bob"])).await.unwrap();
        insert_pull_request(&pool, &pr("pr-3", &["alice"])).await.unwrap();
        set_merged(&pool, "pr-2", Utc::now()).await.unwrap();

        let queue = get_review_requests(&pool, "bob").await.unwrap();
        let ids: Vec<&str> = queue.iter().map(|p| p.pull_request_id.as_str()).collect();
        assert_eq!(ids, vec!["pr-1", "pr-2"]);
        assert_eq!(queue[1].status, PullRequestStatus::Merged);

        assert!(get_review_requests(&pool, "dave").await.unwrap().is_empty());
    }
}
