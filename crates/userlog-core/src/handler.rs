//! Event handler abstraction.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::event::Event;

/// Something that applies a single event, such as the replay engine.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Apply one event.
    async fn handle_event(&self, event: &Event) -> Result<(), DomainError>;
}
