//! Business logic services.
//!
//! The reviewer assignment engine and its storage seams, the team and user
//! use-cases, and the HTTP boundary that exposes them.

pub mod assignment;
pub mod directory;
pub mod http_api;
pub mod selector;
pub mod server;
pub mod teams;
pub mod users;

pub use assignment::ReviewerAssignmentEngine;
pub use directory::{PullRequestStore, TeamDirectory, UserDirectory};
pub use selector::{RandomSelector, ReviewerSelector};
