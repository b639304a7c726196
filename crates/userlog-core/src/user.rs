//! User materialization types.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A materialized user row in the relational state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Store-assigned identifier.
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// When the user was first created.
    pub created_at: NaiveDateTime,
}

/// The user snapshot carried in an event's `description`.
///
/// `id` is the relational identifier when the publisher knew it. Replay uses
/// it as the stable identity and falls back to `username` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    /// Relational identifier, if assigned.
    #[serde(default)]
    pub id: Option<i64>,
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Creation time, if known.
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl UserPayload {
    /// Returns the identity used to match this payload against stored rows.
    #[must_use]
    pub fn identity(&self) -> UserIdentity {
        match self.id {
            Some(id) => UserIdentity::Id(id),
            None => UserIdentity::Username(self.username.clone()),
        }
    }

    /// Decodes a payload from an event description.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` if the description is not a user
    /// snapshot.
    pub fn from_description(description: &str) -> Result<Self, DomainError> {
        serde_json::from_str(description)
            .map_err(|e| DomainError::Deserialization(format!("user payload: {e}")))
    }
}

impl From<&UserRecord> for UserPayload {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: Some(record.id),
            username: record.username.clone(),
            email: record.email.clone(),
            created_at: Some(record.created_at),
        }
    }
}

/// How a payload is matched to a stored user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserIdentity {
    /// Match by relational identifier.
    Id(i64),
    /// Match by login name.
    Username(String),
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={id}"),
            Self::Username(name) => write!(f, "username={name}"),
        }
    }
}

/// A user row to insert. `id` is `None` to let the store assign one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Identifier to preserve, if any.
    pub id: Option<i64>,
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Creation time.
    pub created_at: NaiveDateTime,
}
