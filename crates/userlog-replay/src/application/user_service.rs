//! User mutations that write the relational store and then publish an event.
//!
//! The store write and the publish are not atomic. A publish failure is
//! returned to the caller after the row has already changed.

use std::sync::Arc;

use tracing::{info, warn};
use userlog_core::clock::Clock;
use userlog_core::error::DomainError;
use userlog_core::event::EventType;
use userlog_core::repository::UserRepository;
use userlog_core::user::{NewUser, UserPayload, UserRecord};

use crate::application::publisher::EventPublisher;
use crate::domain::commands::{CreateUser, EditUser};

fn validate(username: &str, email: &str) -> Result<(), DomainError> {
    if username.trim().is_empty() {
        return Err(DomainError::InvalidArgument("username cannot be empty".into()));
    }
    if email.trim().is_empty() {
        return Err(DomainError::InvalidArgument("email cannot be empty".into()));
    }
    Ok(())
}

/// Service for user mutations.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    publisher: EventPublisher,
    clock: Arc<dyn Clock>,
}

impl UserService {
    /// Creates a new `UserService`.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        publisher: EventPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            publisher,
            clock,
        }
    }

    /// Inserts a user stamped with the current time and publishes `CREATION`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a blank username or email,
    /// `DomainError::Storage` if the insert fails, or `DomainError::Publish`
    /// if the event could not be sent.
    pub async fn create_user(&self, command: &CreateUser) -> Result<UserRecord, DomainError> {
        validate(&command.username, &command.email)?;
        let record = self
            .users
            .insert(NewUser {
                id: None,
                username: command.username.clone(),
                email: command.email.clone(),
                created_at: self.clock.now(),
            })
            .await?;
        info!(user_id = record.id, username = %record.username, "user created");

        self.publisher
            .publish(EventType::Creation, &UserPayload::from(&record))
            .await?;
        Ok(record)
    }

    /// Overwrites a user's username and email and publishes `EDITION`.
    /// Returns `None` if the user does not exist.
    ///
    /// # Errors
    ///
    /// Same as [`UserService::create_user`].
    pub async fn edit_user(&self, command: &EditUser) -> Result<Option<UserRecord>, DomainError> {
        validate(&command.username, &command.email)?;
        let Some(mut record) = self.users.find_by_id(command.id).await? else {
            warn!(user_id = command.id, "no user found to edit");
            return Ok(None);
        };

        record.username.clone_from(&command.username);
        record.email.clone_from(&command.email);
        if !self.users.update(&record).await? {
            warn!(user_id = command.id, "user disappeared before edit");
            return Ok(None);
        }
        info!(user_id = record.id, "user edited");

        self.publisher
            .publish(EventType::Edition, &UserPayload::from(&record))
            .await?;
        Ok(Some(record))
    }

    /// Deletes a user and publishes `DELETION`. Returns `false` if the user
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Storage` if the store fails, or
    /// `DomainError::Publish` if the event could not be sent.
    pub async fn delete_user(&self, id: i64) -> Result<bool, DomainError> {
        let Some(record) = self.users.find_by_id(id).await? else {
            warn!(user_id = id, "no user found to delete");
            return Ok(false);
        };
        if !self.users.delete_by_id(id).await? {
            warn!(user_id = id, "user disappeared before delete");
            return Ok(false);
        }
        info!(user_id = id, "user deleted");

        self.publisher
            .publish(EventType::Deletion, &UserPayload::from(&record))
            .await?;
        Ok(true)
    }

    /// Looks up a user by username.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Storage` if the read fails.
    pub async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, DomainError> {
        self.users.find_by_username(username).await
    }
}
