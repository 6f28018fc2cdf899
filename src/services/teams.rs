//! Team use-cases: registering a team with its members and reading it back.

use std::collections::HashSet;

use crate::db::pool::DbPool;
use crate::db::{teams, DbError};
use crate::error::AppError;
use crate::models::Team;

fn validate_team(team: &Team) -> Result<(), AppError> {
    if team.team_name.trim().is_empty() {
        return Err(AppError::invalid_input_field(
            "Team name must not be empty",
            "team_name",
        ));
    }

    let mut seen = HashSet::new();
    for member in &team.members {
        if member.user_id.trim().is_empty() {
            return Err(AppError::invalid_input_field(
                "Member user_id must not be empty",
                "members.user_id",
            ));
        }
        if member.username.trim().is_empty() {
            return Err(AppError::invalid_input_field(
                format!("Member {} has an empty username", member.user_id),
                "members.username",
            ));
        }
        if !seen.insert(member.user_id.as_str()) {
            return Err(AppError::invalid_input_field(
                format!("Member {} is listed twice", member.user_id),
                "members.user_id",
            ));
        }
    }
    Ok(())
}

/// Create a team and upsert its members.
///
/// Users already stored elsewhere move into this team.
pub async fn add_team(pool: &DbPool, team: Team) -> Result<Team, AppError> {
    validate_team(&team)?;

    teams::insert_team(pool, &team).await.map_err(|e| match e {
        DbError::Duplicate(_) => AppError::already_exists("Team", team.team_name.as_str()),
        other => AppError::database_with_op(other.to_string(), "insert team"),
    })?;

    log::info!(
        "[teams] Added team {} with {} members",
        team.team_name,
        team.members.len()
    );

    teams::get_team(pool, &team.team_name)
        .await?
        .ok_or_else(|| AppError::internal(format!("Team {} vanished after insert", team.team_name)))
}

/// Get a team with its members.
pub async fn get_team(pool: &DbPool, team_name: &str) -> Result<Team, AppError> {
    teams::get_team(pool, team_name)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("Team", team_name))
}
