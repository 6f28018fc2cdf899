//! PR Reviewer Service - pull requests with automatic reviewer assignment.
//!
//! Teams and users are stored in SQLite; every new pull request gets up to
//! two active teammates of its author as reviewers, and a reviewer can be
//! swapped for another eligible teammate while the PR is open.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use tokio_util::sync::CancellationToken;

use config::Config;
use db::SqliteStore;
use error::AppError;
use services::assignment::ReviewerAssignmentEngine;
use services::http_api::ApiState;

/// Initialize the database, build the engine and serve until `shutdown` fires.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), AppError> {
    let pool = db::initialize(&config.database_path, config.db_max_connections).await?;
    let engine = ReviewerAssignmentEngine::from_store(SqliteStore::new(pool.clone()));
    let state = ApiState::new(pool.clone(), engine, shutdown);

    let handle = services::server::start_server(config.socket_addr(), state).await?;
    handle.wait().await;

    pool.close().await;
    log::info!("[app] Shut down");
    Ok(())
}
