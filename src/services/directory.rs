//! Storage seams consumed by the reviewer assignment engine.
//!
//! The engine never touches SQL; it sees users, teams and pull requests
//! only through these traits. `crate::db::SqliteStore` implements all
//! three, tests substitute in-memory fakes.

use async_trait::async_trait;

use crate::db::DbError;
use crate::models::PullRequest;

/// Answers whether a user exists.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: &str) -> Result<bool, DbError>;
}

/// Team membership lookups.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// Active members of `user_id`'s team, excluding `user_id` itself.
    ///
    /// Empty (not an error) when the user has no team or no active teammates.
    async fn active_teammates(&self, user_id: &str) -> Result<Vec<String>, DbError>;

    async fn is_team_member(&self, user_id: &str) -> Result<bool, DbError>;
}

/// Pull request persistence.
#[async_trait]
pub trait PullRequestStore: Send + Sync {
    /// Persist a new PR and its reviewer slots atomically.
    ///
    /// Fails with [`DbError::Duplicate`] when the id is taken.
    async fn insert(&self, pr: &PullRequest) -> Result<(), DbError>;

    async fn get_by_id(&self, pr_id: &str) -> Result<Option<PullRequest>, DbError>;

    /// Whether `user_id` currently holds a reviewer slot on `pr_id`.
    async fn is_reviewer_assigned(&self, pr_id: &str, user_id: &str) -> Result<bool, DbError>;

    /// Rewrite the single slot held by `old_user_id` to `new_user_id`.
    ///
    /// Returns false when no slot changed: the old reviewer no longer holds
    /// it, the new one already holds the other slot, or the PR was merged.
    async fn replace_reviewer(
        &self,
        pr_id: &str,
        old_user_id: &str,
        new_user_id: &str,
    ) -> Result<bool, DbError>;

    /// Mark the PR merged and return its merged state. `None` if absent.
    async fn mark_merged(&self, pr_id: &str) -> Result<Option<PullRequest>, DbError>;
}
