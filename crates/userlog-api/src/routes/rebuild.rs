//! Full rebuild of the user store from the event log.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::{info, instrument};

use userlog_replay::domain::replay::RebuildReport;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /
#[instrument(skip(state))]
async fn rebuild(State(state): State<AppState>) -> Result<Json<RebuildReport>, ApiError> {
    info!("rebuild requested");
    let report = state.replay.rebuild_all().await?;
    Ok(Json(report))
}

/// Returns the rebuild router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(rebuild))
}
