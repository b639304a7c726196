//! Test publishers: mock `MessagePublisher` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use userlog_core::broker::{Delivery, MessagePublisher};
use userlog_core::error::DomainError;

/// A publisher that records every send and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<Delivery>>,
}

impl RecordingPublisher {
    /// Create a publisher with no recorded sends.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all sends, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sent(&self) -> Vec<Delivery> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn send(&self, topic: &str, payload: &str) -> Result<(), DomainError> {
        self.sent.lock().unwrap().push(Delivery {
            topic: topic.to_owned(),
            payload: payload.to_owned(),
        });
        Ok(())
    }
}

/// A publisher that always fails with a publish error.
#[derive(Debug)]
pub struct FailingPublisher;

#[async_trait]
impl MessagePublisher for FailingPublisher {
    async fn send(&self, _topic: &str, _payload: &str) -> Result<(), DomainError> {
        Err(DomainError::Publish("broker unavailable".into()))
    }
}
