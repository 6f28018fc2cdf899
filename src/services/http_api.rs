//! REST API routes.
//!
//! Thin handlers over the team/user use-cases and the assignment engine.
//! Each request runs under a child of the server's cancellation token.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{NewPullRequest, PullRequest, Reassignment, Team, User};
use crate::services::assignment::ReviewerAssignmentEngine;
use crate::services::users::ReviewRequests;
use crate::services::{teams, users};

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub engine: Arc<ReviewerAssignmentEngine>,
    /// Cancelled when the server shuts down.
    pub shutdown: CancellationToken,
}

impl ApiState {
    pub fn new(db: DbPool, engine: ReviewerAssignmentEngine, shutdown: CancellationToken) -> Self {
        Self {
            db,
            engine: Arc::new(engine),
            shutdown,
        }
    }
}

// ── Error handling ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(AppError);

fn status_and_code(err: &AppError) -> (StatusCode, &'static str) {
    match err {
        AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        AppError::AlreadyExists { resource, .. } if resource == "Team" => {
            (StatusCode::BAD_REQUEST, "TEAM_EXISTS")
        }
        AppError::AlreadyExists { resource, .. } if resource == "PullRequest" => {
            (StatusCode::CONFLICT, "PR_EXISTS")
        }
        AppError::AlreadyExists { .. } => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
        AppError::PrMerged { .. } => (StatusCode::CONFLICT, "PR_MERGED"),
        AppError::NotAssigned { .. } => (StatusCode::CONFLICT, "NOT_ASSIGNED"),
        AppError::NoCandidate { .. } => (StatusCode::CONFLICT, "NO_CANDIDATE"),
        AppError::ReviewerChanged { .. } => (StatusCode::CONFLICT, "REVIEWER_CHANGED"),
        AppError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        AppError::Cancelled { .. } => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
        AppError::Database { .. } | AppError::Internal { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let (status, code) = status_and_code(&self.0);
        if status.is_server_error() {
            log::error!("[api] {}", self.0);
        } else {
            log::debug!("[api] {} {}", code, self.0);
        }
        (
            status,
            Json(ErrorEnvelope {
                error: ErrorBody {
                    code,
                    message: self.0.to_string(),
                },
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::InvalidInput {
            message: rejection.body_text(),
            field: None,
        })
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::InvalidInput {
            message: rejection.body_text(),
            field: None,
        })
    }
}

// ── Request / response bodies ────────────────────────────────────────────────

#[derive(Deserialize)]
struct TeamQuery {
    team_name: String,
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: String,
}

#[derive(Deserialize)]
struct SetIsActiveRequest {
    user_id: String,
    is_active: bool,
}

#[derive(Deserialize)]
struct MergeRequest {
    pull_request_id: String,
}

#[derive(Deserialize)]
struct ReassignRequest {
    pull_request_id: String,
    old_user_id: String,
}

#[derive(Serialize)]
struct TeamResponse {
    team: Team,
}

#[derive(Serialize)]
struct UserResponse {
    user: User,
}

#[derive(Serialize)]
struct PullRequestResponse {
    pr: PullRequest,
}

// ── Route builder ────────────────────────────────────────────────────────────

pub fn api_routes() -> Router<ApiState> {
    Router::new()
        .route("/team/add", post(add_team_handler))
        .route("/team/get", get(get_team_handler))
        .route("/users/setIsActive", post(set_is_active_handler))
        .route("/users/getReview", get(get_review_handler))
        .route("/pullRequest/create", post(create_pr_handler))
        .route("/pullRequest/merge", post(merge_pr_handler))
        .route("/pullRequest/reassign", post(reassign_handler))
}

/// The full application router with state attached.
pub fn router(state: ApiState) -> Router {
    api_routes().with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn add_team_handler(
    State(state): State<ApiState>,
    body: Result<Json<Team>, JsonRejection>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiErr> {
    let Json(team) = body?;
    let team = teams::add_team(&state.db, team).await?;
    Ok((StatusCode::CREATED, Json(TeamResponse { team })))
}

async fn get_team_handler(
    State(state): State<ApiState>,
    query: Result<Query<TeamQuery>, QueryRejection>,
) -> Result<Json<Team>, ApiErr> {
    let Query(query) = query?;
    Ok(Json(teams::get_team(&state.db, &query.team_name).await?))
}

async fn set_is_active_handler(
    State(state): State<ApiState>,
    body: Result<Json<SetIsActiveRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiErr> {
    let Json(req) = body?;
    let user = users::set_is_active(&state.db, &req.user_id, req.is_active).await?;
    Ok(Json(UserResponse { user }))
}

async fn get_review_handler(
    State(state): State<ApiState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ReviewRequests>, ApiErr> {
    let Query(query) = query?;
    Ok(Json(users::get_review_requests(&state.db, &query.user_id).await?))
}

async fn create_pr_handler(
    State(state): State<ApiState>,
    body: Result<Json<NewPullRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PullRequestResponse>), ApiErr> {
    let Json(new_pr) = body?;
    let cancel = state.shutdown.child_token();
    let pr = state.engine.create_pull_request(new_pr, &cancel).await?;
    Ok((StatusCode::CREATED, Json(PullRequestResponse { pr })))
}

async fn merge_pr_handler(
    State(state): State<ApiState>,
    body: Result<Json<MergeRequest>, JsonRejection>,
) -> Result<Json<PullRequestResponse>, ApiErr> {
    let Json(req) = body?;
    let cancel = state.shutdown.child_token();
    let pr = state
        .engine
        .merge_pull_request(&req.pull_request_id, &cancel)
        .await?;
    Ok(Json(PullRequestResponse { pr }))
}

async fn reassign_handler(
    State(state): State<ApiState>,
    body: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<Reassignment>, ApiErr> {
    let Json(req) = body?;
    let cancel = state.shutdown.child_token();
    let outcome = state
        .engine
        .reassign_reviewer(&req.pull_request_id, &req.old_user_id, &cancel)
        .await?;
    Ok(Json(outcome))
}
