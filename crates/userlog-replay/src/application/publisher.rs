//! Turns user mutations into events on the broker topic.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};
use userlog_core::broker::MessagePublisher;
use userlog_core::clock::Clock;
use userlog_core::error::DomainError;
use userlog_core::event::{Event, EventType};
use userlog_core::retry::RetryPolicy;

/// Publishes one event per call on a fixed topic.
///
/// Publishing is independent of the caller's own store write: a failure here
/// does not undo that write, and a retried send may be delivered twice.
#[derive(Clone)]
pub struct EventPublisher {
    broker: Arc<dyn MessagePublisher>,
    clock: Arc<dyn Clock>,
    topic: String,
    retry: RetryPolicy,
}

impl EventPublisher {
    /// Creates a publisher for `topic` that sends once per call.
    #[must_use]
    pub fn new(
        broker: Arc<dyn MessagePublisher>,
        clock: Arc<dyn Clock>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            clock,
            topic: topic.into(),
            retry: RetryPolicy::no_retry(),
        }
    }

    /// Retries transient send failures under `retry`.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builds an event of `event_type` whose description is `subject`
    /// serialized, stamps it with the current time and sends it.
    ///
    /// Returns the event as sent.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Publish` if serialization or the send fails.
    pub async fn publish<S>(&self, event_type: EventType, subject: &S) -> Result<Event, DomainError>
    where
        S: Serialize + Sync + ?Sized,
    {
        let description = serde_json::to_string(subject)
            .map_err(|e| DomainError::Publish(format!("subject serialization failed: {e}")))?;
        let event = Event::new(event_type, description, self.clock.now());
        let payload = serde_json::to_string(&event)
            .map_err(|e| DomainError::Publish(format!("event serialization failed: {e}")))?;

        let broker = &self.broker;
        let topic = self.topic.as_str();
        let body = payload.as_str();
        match self.retry.run("publish", move || broker.send(topic, body)).await {
            Ok(()) => {
                info!(topic, %event_type, payload = %payload, "event published");
                Ok(event)
            }
            Err(err) => {
                error!(topic, %event_type, error = %err, "failed to publish event");
                Err(match err {
                    DomainError::Publish(_) => err,
                    other => DomainError::Publish(other.to_string()),
                })
            }
        }
    }
}
