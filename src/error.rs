//! Application error types.
//!
//! Every use-case returns `AppError`. Variants serialize to a tagged JSON
//! object, and [`AppError::kind`] folds them into the coarse taxonomy the
//! HTTP layer maps to status codes.

use serde::Serialize;
use thiserror::Error;

/// Application-level errors.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },

    /// Requested resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Resource with the same identity already exists.
    #[error("Already exists: {resource} {id}")]
    AlreadyExists { resource: String, id: String },

    /// Mutation attempted on a merged pull request.
    #[error("Pull request {pr_id} is already merged")]
    PrMerged { pr_id: String },

    /// The reviewer to replace is not assigned to the pull request.
    #[error("{user_id} is not a reviewer of {pr_id}")]
    NotAssigned { pr_id: String, user_id: String },

    /// No eligible replacement reviewer is left after exclusions.
    #[error("No active replacement candidate for {pr_id}")]
    NoCandidate { pr_id: String },

    /// The reviewer slot changed between the checks and the update.
    #[error("Reviewer slot of {user_id} on {pr_id} changed concurrently")]
    ReviewerChanged { pr_id: String, user_id: String },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// The caller cancelled the operation.
    #[error("Cancelled during {step}")]
    Cancelled { step: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Coarse classification of [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    PrMerged,
    NotAssigned,
    NoCandidate,
    ReviewerChanged,
    InvalidInput,
    Cancelled,
    Internal,
}

impl AppError {
    /// Create a database error with operation context.
    pub fn database_with_op(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    pub fn already_exists(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::PrMerged { .. } => ErrorKind::PrMerged,
            Self::NotAssigned { .. } => ErrorKind::NotAssigned,
            Self::NoCandidate { .. } => ErrorKind::NoCandidate,
            Self::ReviewerChanged { .. } => ErrorKind::ReviewerChanged,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Database { .. } | Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Valid terminal outcomes of a business rule, as opposed to faults.
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PrMerged | ErrorKind::NotAssigned | ErrorKind::NoCandidate
        )
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            operation: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::Database {
            message: err.to_string(),
            operation: None,
        }
    }
}
