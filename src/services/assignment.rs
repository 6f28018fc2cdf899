//! Reviewer assignment engine.
//!
//! Picks reviewers when a pull request is created and swaps a single
//! reviewer on request. The engine keeps no state between calls; every
//! consistency guarantee comes from the storage seams in
//! [`super::directory`]. Each operation takes a `CancellationToken`: reads
//! are abandoned when it fires, writes are only refused before they start.

use std::future::Future;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use tokio_util::sync::CancellationToken;

use super::directory::{PullRequestStore, TeamDirectory, UserDirectory};
use super::selector::{pick_one, pick_reviewers, RandomSelector, ReviewerSelector};
use crate::db::DbError;
use crate::error::AppError;
use crate::models::{
    NewPullRequest, PullRequest, PullRequestStatus, Reassignment, ReviewerSet,
};

/// Run one storage step unless `cancel` fires first.
async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    step: &'static str,
    fut: F,
) -> Result<F::Output, AppError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled { step: step.to_string() }),
        out = fut => Ok(out),
    }
}

/// Refuse to start a write once `cancel` has fired.
///
/// Writes are never raced against the token: a write that reached the
/// store must be reported as done.
fn check_cancelled(cancel: &CancellationToken, step: &'static str) -> Result<(), AppError> {
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled {
            step: step.to_string(),
        });
    }
    Ok(())
}

fn storage_failure(step: &'static str) -> impl FnOnce(DbError) -> AppError {
    move |err| AppError::database_with_op(err.to_string(), step)
}

fn require_non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_input_field(
            format!("{} must not be empty", field),
            field,
        ));
    }
    Ok(())
}

/// Orchestrates reviewer selection over the user, team and PR stores.
#[derive(Clone)]
pub struct ReviewerAssignmentEngine {
    users: Arc<dyn UserDirectory>,
    teams: Arc<dyn TeamDirectory>,
    pull_requests: Arc<dyn PullRequestStore>,
    selector: Arc<dyn ReviewerSelector>,
}

impl ReviewerAssignmentEngine {
    /// Create an engine that selects uniformly at random.
    pub fn new(
        users: Arc<dyn UserDirectory>,
        teams: Arc<dyn TeamDirectory>,
        pull_requests: Arc<dyn PullRequestStore>,
    ) -> Self {
        Self {
            users,
            teams,
            pull_requests,
            selector: Arc::new(RandomSelector),
        }
    }

    /// Create an engine over a single backend implementing all three seams.
    pub fn from_store<S>(store: S) -> Self
    where
        S: UserDirectory + TeamDirectory + PullRequestStore + 'static,
    {
        let store = Arc::new(store);
        Self::new(store.clone(), store.clone(), store)
    }

    /// Replace the selection strategy.
    pub fn with_selector(mut self, selector: Arc<dyn ReviewerSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Create a pull request and assign up to two of the author's active teammates.
    pub async fn create_pull_request(
        &self,
        new_pr: NewPullRequest,
        cancel: &CancellationToken,
    ) -> Result<PullRequest, AppError> {
        require_non_empty(&new_pr.pull_request_id, "pull_request_id")?;
        require_non_empty(&new_pr.pull_request_name, "pull_request_name")?;
        require_non_empty(&new_pr.author_id, "author_id")?;
        let author = new_pr.author_id.as_str();

        const CHECK_AUTHOR: &str = "check author exists";
        if !cancellable(cancel, CHECK_AUTHOR, self.users.exists(author))
            .await?
            .map_err(storage_failure(CHECK_AUTHOR))?
        {
            return Err(AppError::not_found_with_id("User", author));
        }

        const CHECK_TEAM: &str = "check author team";
        if !cancellable(cancel, CHECK_TEAM, self.teams.is_team_member(author))
            .await?
            .map_err(storage_failure(CHECK_TEAM))?
        {
            return Err(AppError::not_found_with_id("Team membership", author));
        }

        const LOAD_TEAMMATES: &str = "load author teammates";
        let candidates = cancellable(cancel, LOAD_TEAMMATES, self.teams.active_teammates(author))
            .await?
            .map_err(storage_failure(LOAD_TEAMMATES))?;

        let picked = pick_reviewers(self.selector.as_ref(), &candidates);
        let assigned_reviewers = ReviewerSet::try_from(picked)
            .map_err(|e| AppError::internal(format!("Teammate directory returned {}", e)))?;

        let pr = PullRequest {
            pull_request_id: new_pr.pull_request_id,
            pull_request_name: new_pr.pull_request_name,
            author_id: new_pr.author_id,
            status: PullRequestStatus::Open,
            assigned_reviewers,
            created_at: Utc::now().trunc_subsecs(0),
            merged_at: None,
        };

        const INSERT: &str = "insert pull request";
        check_cancelled(cancel, INSERT)?;
        self.pull_requests
            .insert(&pr)
            .await
            .map_err(|err| match err {
                DbError::Duplicate(_) => {
                    AppError::already_exists("PullRequest", pr.pull_request_id.as_str())
                }
                other => storage_failure(INSERT)(other),
            })?;

        log::debug!(
            "[engine] Created {} by {} with reviewers {:?} from {} candidates",
            pr.pull_request_id,
            pr.author_id,
            pr.assigned_reviewers.as_slice(),
            candidates.len()
        );
        Ok(pr)
    }

    /// Mark a pull request merged. Repeating the call returns the same state.
    pub async fn merge_pull_request(
        &self,
        pr_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PullRequest, AppError> {
        require_non_empty(pr_id, "pull_request_id")?;

        const MERGE: &str = "mark merged";
        check_cancelled(cancel, MERGE)?;
        let merged = self
            .pull_requests
            .mark_merged(pr_id)
            .await
            .map_err(storage_failure(MERGE))?
            .ok_or_else(|| AppError::not_found_with_id("PullRequest", pr_id))?;

        log::info!("[engine] Merged {}", pr_id);
        Ok(merged)
    }

    /// Replace `old_user_id` on `pr_id` with another active teammate.
    ///
    /// The staying reviewer and the author are never chosen. Nothing is
    /// written unless every check passes; a slot that changed underneath
    /// the final update surfaces as [`AppError::ReviewerChanged`].
    pub async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Reassignment, AppError> {
        require_non_empty(pr_id, "pull_request_id")?;
        require_non_empty(old_user_id, "old_user_id")?;

        const LOAD_PR: &str = "load pull request";
        let pr = cancellable(cancel, LOAD_PR, self.pull_requests.get_by_id(pr_id))
            .await?
            .map_err(storage_failure(LOAD_PR))?
            .ok_or_else(|| AppError::not_found_with_id("PullRequest", pr_id))?;

        if pr.is_merged() {
            return Err(AppError::PrMerged {
                pr_id: pr_id.to_string(),
            });
        }

        const CHECK_USER: &str = "check reviewer exists";
        if !cancellable(cancel, CHECK_USER, self.users.exists(old_user_id))
            .await?
            .map_err(storage_failure(CHECK_USER))?
        {
            return Err(AppError::not_found_with_id("User", old_user_id));
        }

        // Ask the assignment record, not the snapshot loaded above.
        const CHECK_ASSIGNED: &str = "check reviewer assigned";
        if !cancellable(
            cancel,
            CHECK_ASSIGNED,
            self.pull_requests.is_reviewer_assigned(pr_id, old_user_id),
        )
        .await?
        .map_err(storage_failure(CHECK_ASSIGNED))?
        {
            return Err(AppError::NotAssigned {
                pr_id: pr_id.to_string(),
                user_id: old_user_id.to_string(),
            });
        }

        let staying = pr.assigned_reviewers.other_than(old_user_id);

        const LOAD_TEAMMATES: &str = "load reviewer teammates";
        let mut candidates = cancellable(
            cancel,
            LOAD_TEAMMATES,
            self.teams.active_teammates(old_user_id),
        )
        .await?
        .map_err(storage_failure(LOAD_TEAMMATES))?;
        candidates.retain(|c| Some(c.as_str()) != staying && *c != pr.author_id);

        let Some(new_reviewer) = pick_one(self.selector.as_ref(), &candidates) else {
            log::warn!(
                "[engine] No replacement for {} on {} (staying: {:?})",
                old_user_id,
                pr_id,
                staying
            );
            return Err(AppError::NoCandidate {
                pr_id: pr_id.to_string(),
            });
        };
        let new_reviewer = new_reviewer.to_string();

        const REPLACE: &str = "replace reviewer";
        check_cancelled(cancel, REPLACE)?;
        let replaced = self
            .pull_requests
            .replace_reviewer(pr_id, old_user_id, &new_reviewer)
            .await
            .map_err(storage_failure(REPLACE))?;

        if !replaced {
            log::warn!(
                "[engine] Slot of {} on {} changed before it could be replaced",
                old_user_id,
                pr_id
            );
            return Err(AppError::ReviewerChanged {
                pr_id: pr_id.to_string(),
                user_id: old_user_id.to_string(),
            });
        }

        let mut updated = pr;
        if !updated
            .assigned_reviewers
            .replace(old_user_id, new_reviewer.as_str())
        {
            // The snapshot was stale; report what the store now holds.
            const RELOAD: &str = "reload pull request";
            updated = self
                .pull_requests
                .get_by_id(pr_id)
                .await
                .map_err(storage_failure(RELOAD))?
                .ok_or_else(|| AppError::not_found_with_id("PullRequest", pr_id))?;
        }

        log::info!(
            "[engine] Reassigned {} on {}: {} -> {}",
            pr_id,
            updated.author_id,
            old_user_id,
            new_reviewer
        );
        Ok(Reassignment {
            pr: updated,
            replaced_by: new_reviewer,
        })
    }
}
