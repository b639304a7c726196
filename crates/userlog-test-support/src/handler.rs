//! Test handler: records the events a consumer forwards.

use std::sync::Mutex;

use async_trait::async_trait;
use userlog_core::error::DomainError;
use userlog_core::event::Event;
use userlog_core::handler::EventHandler;

/// An event handler that records every call. When built with `failing`, each
/// call is recorded and then rejected with a storage error.
#[derive(Debug, Default)]
pub struct RecordingEventHandler {
    handled: Mutex<Vec<Event>>,
    fail: bool,
}

impl RecordingEventHandler {
    /// Create a handler that accepts every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handler that rejects every event.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            handled: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Returns a snapshot of every event passed to `handle_event`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn handled(&self) -> Vec<Event> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for RecordingEventHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), DomainError> {
        self.handled.lock().unwrap().push(event.clone());
        if self.fail {
            Err(DomainError::Storage("connection refused".into()))
        } else {
            Ok(())
        }
    }
}
