//! Replay decisions derived purely from an event.
//!
//! Decoding is separated from execution so a whole log can be checked before
//! any state is touched.

use chrono::NaiveDateTime;
use serde::Serialize;
use userlog_core::error::DomainError;
use userlog_core::event::{Event, EventType};
use userlog_core::user::{UserIdentity, UserPayload};

/// A user snapshot ready to be written, with its creation time resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    /// The decoded payload.
    pub payload: UserPayload,
    /// Creation time: the payload's own, else the event timestamp.
    pub created_at: NaiveDateTime,
}

impl UserSnapshot {
    /// Identity used to match the snapshot against stored rows.
    #[must_use]
    pub fn identity(&self) -> UserIdentity {
        self.payload.identity()
    }
}

/// What replaying one event does to the user store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayAction {
    /// Insert the user, or overwrite the row with the same identity.
    Create(UserSnapshot),
    /// Remove the row with this identity, if any.
    Delete(UserIdentity),
    /// Overwrite the row with the same identity, or insert it.
    Edit(UserSnapshot),
    /// No state change.
    Integrate,
}

impl ReplayAction {
    /// Decodes the action an event calls for.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` if the description is not a user
    /// payload, or `DomainError::InvalidArgument` if a creating event carries no
    /// time at all.
    pub fn from_event(event: &Event) -> Result<Self, DomainError> {
        match event.event_type {
            EventType::Creation => snapshot(event).map(Self::Create),
            EventType::Deletion => {
                UserPayload::from_description(&event.description).map(|p| Self::Delete(p.identity()))
            }
            EventType::Edition => snapshot(event).map(Self::Edit),
            EventType::Integration => Ok(Self::Integrate),
        }
    }
}

fn snapshot(event: &Event) -> Result<UserSnapshot, DomainError> {
    let payload = UserPayload::from_description(&event.description)?;
    let created_at = payload.created_at.or(event.timestamp).ok_or_else(|| {
        DomainError::InvalidArgument(format!(
            "{} event {:?} has no timestamp and its payload no createdAt",
            event.event_type, event.id
        ))
    })?;
    Ok(UserSnapshot {
        payload,
        created_at,
    })
}

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// A new row was inserted with this id.
    Inserted(i64),
    /// The row with this id was overwritten.
    Updated(i64),
    /// The row with this id was removed.
    Deleted(i64),
    /// Nothing matched; nothing changed.
    Skipped,
    /// The event carries no state change.
    Logged,
}

/// Summary of a completed rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Rows removed when the store was cleared.
    pub users_cleared: u64,
    /// Events applied, in log order.
    pub events_replayed: usize,
    /// Rows present once the rebuild finished.
    pub users_materialized: usize,
}
