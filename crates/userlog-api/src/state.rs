//! Shared application state.

use std::sync::Arc;

use userlog_replay::application::event_log_service::EventLogService;
use userlog_replay::application::replay_engine::ReplayEngine;
use userlog_replay::application::user_service::UserService;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// User mutations and lookups.
    pub users: UserService,
    /// Event log queries and maintenance.
    pub event_log: EventLogService,
    /// Replay engine, shared with the consumer task.
    pub replay: Arc<ReplayEngine>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(users: UserService, event_log: EventLogService, replay: Arc<ReplayEngine>) -> Self {
        Self {
            users,
            event_log,
            replay,
        }
    }
}
