//! Event model shared by the log, the broker wire format and the replay engine.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// The closed set of event types. Each type selects a replay handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// A user was created.
    Creation,
    /// A user was deleted.
    Deletion,
    /// A user's mutable fields were edited.
    Edition,
    /// An integration notice; carries no state change.
    Integration,
}

impl EventType {
    /// All known event types.
    pub const ALL: [Self; 4] = [
        Self::Creation,
        Self::Deletion,
        Self::Edition,
        Self::Integration,
    ];

    /// Returns the wire name of this type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creation => "CREATION",
            Self::Deletion => "DELETION",
            Self::Edition => "EDITION",
            Self::Integration => "INTEGRATION",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::UnknownEventType(s.to_owned()))
    }
}

/// A recorded fact about a past user mutation.
///
/// Immutable once published except for the soft-delete bookkeeping kept by
/// the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Store-assigned identifier. `None` until the event is logged.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Selects the replay semantics.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Serialized snapshot of the subject of the event.
    pub description: String,
    /// Logical event time, set by the publisher.
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
    /// Audit stamp set when the event is logged.
    #[serde(default)]
    pub created_date: Option<NaiveDateTime>,
    /// Audit stamp refreshed on every log mutation.
    #[serde(default)]
    pub updated_date: Option<NaiveDateTime>,
    /// Soft-delete flag.
    #[serde(default)]
    pub deleted: bool,
}

impl Event {
    /// Creates an unlogged event.
    #[must_use]
    pub fn new(
        event_type: EventType,
        description: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            id: None,
            event_type,
            description: description.into(),
            timestamp: Some(timestamp),
            created_date: None,
            updated_date: None,
            deleted: false,
        }
    }

    /// Decodes an event from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` if the payload is not a
    /// well-formed event, including an unrecognized `type`.
    pub fn from_json(payload: &str) -> Result<Self, DomainError> {
        serde_json::from_str(payload).map_err(|e| DomainError::Deserialization(e.to_string()))
    }
}

/// Replacement values for the mutable fields of a logged event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    /// The new event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// The new serialized subject.
    pub description: String,
    /// The new logical event time.
    pub timestamp: Option<NaiveDateTime>,
}
