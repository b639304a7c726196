//! Routes for user mutations and lookups.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};

use userlog_core::error::DomainError;
use userlog_core::user::UserRecord;
use userlog_replay::domain::commands::{CreateUser, EditUser};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST and PUT.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
}

/// POST /
#[instrument(skip(state, request), fields(username = %request.username))]
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    let command = CreateUser {
        username: request.username,
        email: request.email,
    };
    let record = state.users.create_user(&command).await?;
    info!(user_id = record.id, "user created via api");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /{username}
#[instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserRecord>, ApiError> {
    state
        .users
        .get_user_by_username(&username)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(DomainError::NotFound(format!("user '{username}'"))))
}

/// PUT /{id}
#[instrument(skip(state, request))]
async fn edit_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UserRequest>,
) -> Result<Json<UserRecord>, ApiError> {
    let command = EditUser {
        id,
        username: request.username,
        email: request.email,
    };
    state
        .users
        .edit_user(&command)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(DomainError::NotFound(format!("user {id}"))))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.users.delete_user(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError(DomainError::NotFound(format!("user {id}"))))
    }
}

/// Returns the router for users.
///
/// Reads go by username and writes by id, so the single path segment is
/// interpreted per method.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(create_user)).route(
        "/{user}",
        get(get_user).put(edit_user).delete(delete_user),
    )
}
