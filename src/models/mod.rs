//! Data models for the service.
//!
//! These models represent the entities stored in SQLite and returned over
//! the HTTP API. All of them derive Serialize; row-shaped ones also derive
//! FromRow for SQLx queries.

pub mod pull_request;
pub mod team;
pub mod user;

// Re-exports for convenient access
pub use pull_request::{
    NewPullRequest, PullRequest, PullRequestShort, PullRequestStatus, Reassignment, ReviewerSet,
    ReviewerSetError,
};
pub use team::{Team, TeamMember};
pub use user::User;
