//! Pull request model and the fixed-capacity reviewer set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Review status of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    pub fn from_merged(is_merged: bool) -> Self {
        if is_merged {
            Self::Merged
        } else {
            Self::Open
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Merged => write!(f, "MERGED"),
        }
    }
}

/// Reasons a list of user ids cannot form a [`ReviewerSet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewerSetError {
    #[error("at most 2 reviewers allowed, got {got}")]
    TooMany { got: usize },

    #[error("reviewer {0} listed twice")]
    Duplicate(String),
}

/// Up to two distinct reviewer ids, in slot order.
///
/// Slot order is preserved through replacement, so a reassigned reviewer
/// keeps the position of the one it replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ReviewerSet(Vec<String>);

impl ReviewerSet {
    pub const CAPACITY: usize = 2;

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0.iter().any(|r| r == user_id)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The reviewer that stays when `user_id` is replaced.
    ///
    /// `None` when `user_id` is the only reviewer (or not a reviewer at all
    /// on a single-slot set).
    pub fn other_than(&self, user_id: &str) -> Option<&str> {
        self.iter().find(|r| *r != user_id)
    }

    /// Swap `old` for `new` in place. Returns false when `old` is absent or
    /// `new` already holds the other slot.
    pub fn replace(&mut self, old: &str, new: impl Into<String>) -> bool {
        let new = new.into();
        if self.iter().any(|r| r == new && r != old) {
            return false;
        }
        match self.0.iter_mut().find(|r| r.as_str() == old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }
}

impl TryFrom<Vec<String>> for ReviewerSet {
    type Error = ReviewerSetError;

    fn try_from(reviewers: Vec<String>) -> Result<Self, Self::Error> {
        if reviewers.len() > Self::CAPACITY {
            return Err(ReviewerSetError::TooMany {
                got: reviewers.len(),
            });
        }
        if let [a, b] = reviewers.as_slice() {
            if a == b {
                return Err(ReviewerSetError::Duplicate(a.clone()));
            }
        }
        Ok(Self(reviewers))
    }
}

impl From<ReviewerSet> for Vec<String> {
    fn from(set: ReviewerSet) -> Self {
        set.0
    }
}

/// A pull request with its assigned reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
    pub assigned_reviewers: ReviewerSet,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Set once, when the PR is merged.
    #[serde(rename = "mergedAt", skip_serializing_if = "Option::is_none", default)]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.status == PullRequestStatus::Merged
    }
}

/// Input for creating a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

/// Short form used in a reviewer's review queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
}

/// Outcome of a reviewer reassignment: the updated PR and who came in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reassignment {
    pub pr: PullRequest,
    pub replaced_by: String,
}
