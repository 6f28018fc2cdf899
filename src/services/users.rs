//! User use-cases: toggling availability and listing review requests.

use serde::Serialize;

use crate::db::pool::DbPool;
use crate::db::{pull_requests, users};
use crate::error::AppError;
use crate::models::{PullRequestShort, User};

/// Pull requests waiting on one reviewer.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewRequests {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShort>,
}

/// Set whether a user can be picked as a reviewer.
///
/// Existing assignments are left alone; only future picks are affected.
pub async fn set_is_active(pool: &DbPool, user_id: &str, is_active: bool) -> Result<User, AppError> {
    let user = users::set_user_active(pool, user_id, is_active)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("User", user_id))?;

    log::info!("[users] {} is_active={}", user_id, is_active);
    Ok(user)
}

/// List pull requests on which `user_id` holds a reviewer slot.
pub async fn get_review_requests(pool: &DbPool, user_id: &str) -> Result<ReviewRequests, AppError> {
    if !users::user_exists(pool, user_id).await? {
        return Err(AppError::not_found_with_id("User", user_id));
    }

    let pull_requests = pull_requests::get_review_requests(pool, user_id).await?;
    Ok(ReviewRequests {
        user_id: user_id.to_string(),
        pull_requests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::initialize;
    use crate::db::teams::insert_team;
    use crate::error::ErrorKind;
    use crate::models::{Team, TeamMember};
    use tempfile::tempdir;

    async fn seeded(dir: &std::path::Path) -> DbPool {
        let pool = initialize(&dir.join("test.db"), 1).await.unwrap();
        let team = Team {
            team_name: "core".into(),
            members: vec![TeamMember {
                user_id: "u1".into(),
                username: "Alice".into(),
                is_active: true,
            }],
        };
        insert_team(&pool, &team).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_set_is_active() {
        let dir = tempdir().unwrap();
        let pool = seeded(dir.path()).await;

        let user = set_is_active(&pool, "u1", false).await.unwrap();
        assert!(!user.is_active);
        assert_eq!(user.team_name, "core");

        let err = set_is_active(&pool, "ghost", true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_review_requests_for_idle_user() {
        let dir = tempdir().unwrap();
        let pool = seeded(dir.path()).await;

        let requests = get_review_requests(&pool, "u1").await.unwrap();
        assert_eq!(requests.user_id, "u1");
        assert!(requests.pull_requests.is_empty());

        let err = get_review_requests(&pool, "ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
