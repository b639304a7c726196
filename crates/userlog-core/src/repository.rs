//! Store abstractions for the event log and the materialized user state.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::{Event, EventType};
use crate::user::{NewUser, UserRecord};

/// Append-only document store for `Event` records.
///
/// List queries return active (not soft-deleted) events in the store's
/// natural retrieval order, which is the order of insertion.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Persist a new event, assigning its id. Returns the stored copy.
    async fn insert(&self, event: Event) -> Result<Event, DomainError>;

    /// Overwrite an already stored event, matched by its id.
    async fn save(&self, event: &Event) -> Result<(), DomainError>;

    /// Load one event by id, whether or not it is soft-deleted.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, DomainError>;

    /// Load active events of one type.
    async fn find_by_type(&self, event_type: EventType) -> Result<Vec<Event>, DomainError>;

    /// Load active events whose `timestamp` is strictly before `cutoff`.
    async fn find_before(&self, cutoff: NaiveDateTime) -> Result<Vec<Event>, DomainError>;

    /// Load every active event.
    async fn find_all(&self) -> Result<Vec<Event>, DomainError>;
}

/// Relational store of materialized user records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Load a user by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, DomainError>;

    /// Load a user by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DomainError>;

    /// Insert a user, preserving `id` when given.
    async fn insert(&self, user: NewUser) -> Result<UserRecord, DomainError>;

    /// Overwrite the stored row with the same id. Returns `false` if absent.
    async fn update(&self, user: &UserRecord) -> Result<bool, DomainError>;

    /// Delete a user by id. Returns `false` if absent.
    async fn delete_by_id(&self, id: i64) -> Result<bool, DomainError>;

    /// Delete every user. Returns the number of rows removed.
    async fn delete_all(&self) -> Result<u64, DomainError>;

    /// Load every user ordered by id.
    async fn list_all(&self) -> Result<Vec<UserRecord>, DomainError>;
}
