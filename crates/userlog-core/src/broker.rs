//! Message transport abstractions.
//!
//! The broker is an at-least-once pub/sub channel: a message may arrive more
//! than once and consumers must tolerate duplicates.

use async_trait::async_trait;

use crate::error::DomainError;

/// A message received from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The topic the message was published on.
    pub topic: String,
    /// The raw UTF-8 payload.
    pub payload: String,
}

/// Sending half of the broker.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish `payload` on `topic`.
    async fn send(&self, topic: &str, payload: &str) -> Result<(), DomainError>;
}

/// Receiving half of a topic subscription.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next delivery. Returns `None` once the subscription closes.
    async fn next_delivery(&mut self) -> Option<Delivery>;
}
