//! Routes for inspecting and maintaining the event log.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use userlog_core::error::DomainError;
use userlog_core::event::{Event, EventPatch};

use crate::error::ApiError;
use crate::state::AppState;

/// Filters for GET /. At most one may be given.
#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    /// Only events strictly before this local date-time.
    pub before: Option<NaiveDateTime>,
    /// Only events of this type name.
    pub name: Option<String>,
}

/// GET /
#[instrument(skip(state))]
async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let events = match (query.before, query.name) {
        (Some(_), Some(_)) => {
            return Err(ApiError(DomainError::InvalidArgument(
                "use either 'before' or 'name', not both".into(),
            )));
        }
        (Some(before), None) => state.event_log.get_events_up_to(Some(before)).await?,
        (None, Some(name)) => state.event_log.get_event_by_name(&name).await?,
        (None, None) => state.event_log.get_all_events().await?,
    };
    Ok(Json(events))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.event_log.get_event_by_id(id).await?))
}

/// PUT /{id}
#[instrument(skip(state, patch))]
async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> Result<Json<Event>, ApiError> {
    state
        .event_log
        .update_event(id, patch)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(DomainError::NotFound(format!("event {id}"))))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.event_log.delete_event_by_id(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for the event log.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events))
        .route(
            "/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
}
