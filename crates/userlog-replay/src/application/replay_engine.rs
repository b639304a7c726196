//! Applies events to the user state store, one at a time or as a full rebuild.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};
use userlog_core::error::DomainError;
use userlog_core::event::Event;
use userlog_core::handler::EventHandler;
use userlog_core::repository::UserRepository;
use userlog_core::user::{NewUser, UserIdentity, UserRecord};

use crate::application::event_log_service::EventLogService;
use crate::domain::replay::{RebuildReport, ReplayAction, ReplayOutcome, UserSnapshot};

/// Rebuild progress is logged every this many events.
const PROGRESS_INTERVAL: usize = 500;

/// Stateless dispatcher from events to user store mutations.
///
/// Live `handle` calls share a lock that `rebuild_all` takes exclusively, so
/// a rebuild never interleaves with incremental replay and two rebuilds never
/// run at once.
pub struct ReplayEngine {
    users: Arc<dyn UserRepository>,
    event_log: EventLogService,
    rebuild_lock: RwLock<()>,
}

impl ReplayEngine {
    /// Creates an engine writing to `users` and rebuilding from `event_log`.
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, event_log: EventLogService) -> Self {
        Self {
            users,
            event_log,
            rebuild_lock: RwLock::new(()),
        }
    }

    /// Applies a single event to the user store.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` for an undecodable payload or
    /// `DomainError::Storage` if the store write fails. Either is fatal to this
    /// event only.
    #[instrument(skip(self, event), fields(event_id = ?event.id, event_type = %event.event_type))]
    pub async fn handle(&self, event: &Event) -> Result<ReplayOutcome, DomainError> {
        let _shared = self.rebuild_lock.read().await;
        let action = ReplayAction::from_event(event).inspect_err(|err| {
            error!(error = %err, "event payload could not be decoded");
        })?;
        self.apply(action).await
    }

    /// Clears the user store and replays every active event in log order.
    ///
    /// All payloads are decoded before the store is cleared, so a malformed
    /// log leaves the current state untouched. A store failure during replay
    /// aborts with the state reached so far.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Rebuild` carrying the number of events applied
    /// and the underlying failure.
    pub async fn rebuild_all(&self) -> Result<RebuildReport, DomainError> {
        let _exclusive = self.rebuild_lock.write().await;
        info!("starting to rebuild user state from events");

        let events = self
            .event_log
            .get_all_events()
            .await
            .map_err(|e| rebuild_failed(0, &e))?;
        let plan = events
            .iter()
            .map(ReplayAction::from_event)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| rebuild_failed(0, &e))?;

        let users_cleared = self
            .users
            .delete_all()
            .await
            .map_err(|e| rebuild_failed(0, &e))?;
        info!(users_cleared, events = plan.len(), "user state cleared, replaying events");

        let total = plan.len();
        for (applied, action) in plan.into_iter().enumerate() {
            self.apply(action)
                .await
                .map_err(|e| rebuild_failed(applied, &e))?;
            let done = applied + 1;
            if done % PROGRESS_INTERVAL == 0 {
                info!(done, total, "rebuild progress");
            }
        }

        let users_materialized = self
            .users
            .list_all()
            .await
            .map_err(|e| rebuild_failed(total, &e))?
            .len();
        info!(events_replayed = total, users_materialized, "rebuild completed");

        Ok(RebuildReport {
            users_cleared,
            events_replayed: total,
            users_materialized,
        })
    }

    async fn apply(&self, action: ReplayAction) -> Result<ReplayOutcome, DomainError> {
        match action {
            ReplayAction::Create(snapshot) => self.upsert(snapshot, "created").await,
            ReplayAction::Edit(snapshot) => self.upsert(snapshot, "edited").await,
            ReplayAction::Delete(identity) => self.delete(&identity).await,
            ReplayAction::Integrate => {
                info!("integration event handled");
                Ok(ReplayOutcome::Logged)
            }
        }
    }

    async fn find(&self, identity: &UserIdentity) -> Result<Option<UserRecord>, DomainError> {
        match identity {
            UserIdentity::Id(id) => self.users.find_by_id(*id).await,
            UserIdentity::Username(name) => self.users.find_by_username(name).await,
        }
    }

    /// Overwrites the matching row's mutable fields, or inserts the snapshot.
    async fn upsert(
        &self,
        snapshot: UserSnapshot,
        verb: &'static str,
    ) -> Result<ReplayOutcome, DomainError> {
        let identity = snapshot.identity();
        let UserSnapshot {
            payload,
            created_at,
        } = snapshot;

        if let Some(mut existing) = self.find(&identity).await? {
            existing.username = payload.username;
            existing.email = payload.email;
            if self.users.update(&existing).await? {
                info!(user_id = existing.id, %identity, "user {verb} from event (overwrite)");
                return Ok(ReplayOutcome::Updated(existing.id));
            }
            // The row vanished between read and write; fall through to insert.
            debug!(%identity, "matched row disappeared, inserting");
            let stored = self
                .users
                .insert(NewUser {
                    id: Some(existing.id),
                    username: existing.username,
                    email: existing.email,
                    created_at: existing.created_at,
                })
                .await?;
            return Ok(ReplayOutcome::Inserted(stored.id));
        }

        let stored = self
            .users
            .insert(NewUser {
                id: payload.id,
                username: payload.username,
                email: payload.email,
                created_at,
            })
            .await?;
        info!(user_id = stored.id, %identity, "user {verb} from event (insert)");
        Ok(ReplayOutcome::Inserted(stored.id))
    }

    async fn delete(&self, identity: &UserIdentity) -> Result<ReplayOutcome, DomainError> {
        let Some(existing) = self.find(identity).await? else {
            debug!(%identity, "no user to delete");
            return Ok(ReplayOutcome::Skipped);
        };
        if self.users.delete_by_id(existing.id).await? {
            info!(user_id = existing.id, %identity, "user deleted from event");
            Ok(ReplayOutcome::Deleted(existing.id))
        } else {
            Ok(ReplayOutcome::Skipped)
        }
    }
}

fn rebuild_failed(applied: usize, err: &DomainError) -> DomainError {
    error!(applied, error = %err, "rebuild from events failed");
    DomainError::Rebuild {
        applied,
        reason: err.to_string(),
    }
}

#[async_trait]
impl EventHandler for ReplayEngine {
    async fn handle_event(&self, event: &Event) -> Result<(), DomainError> {
        self.handle(event).await.map(|_| ())
    }
}
