//! Test repositories: in-memory and failing store implementations.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use userlog_core::error::DomainError;
use userlog_core::event::{Event, EventType};
use userlog_core::repository::{EventRepository, UserRepository};
use userlog_core::user::{NewUser, UserRecord};
use uuid::Uuid;

fn connection_refused() -> DomainError {
    DomainError::Storage("connection refused".into())
}

/// An event log kept in a `Vec`, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    events: Mutex<Vec<Event>>,
}

impl InMemoryEventRepository {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log preloaded with `events`. Events without an id get one.
    #[must_use]
    pub fn with_events(events: Vec<Event>) -> Self {
        let events = events
            .into_iter()
            .map(|mut e| {
                e.id.get_or_insert_with(Uuid::new_v4);
                e
            })
            .collect();
        Self {
            events: Mutex::new(events),
        }
    }

    /// Returns a snapshot of every stored event, including soft-deleted ones.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn active<F>(&self, keep: F) -> Vec<Event>
    where
        F: Fn(&Event) -> bool,
    {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !e.deleted && keep(e))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn insert(&self, mut event: Event) -> Result<Event, DomainError> {
        event.id = Some(Uuid::new_v4());
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn save(&self, event: &Event) -> Result<(), DomainError> {
        let mut events = self.events.lock().unwrap();
        let slot = events
            .iter_mut()
            .find(|e| e.id.is_some() && e.id == event.id)
            .ok_or_else(|| DomainError::NotFound(format!("event {:?}", event.id)))?;
        *slot = event.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, DomainError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == Some(id))
            .cloned())
    }

    async fn find_by_type(&self, event_type: EventType) -> Result<Vec<Event>, DomainError> {
        Ok(self.active(|e| e.event_type == event_type))
    }

    async fn find_before(&self, cutoff: NaiveDateTime) -> Result<Vec<Event>, DomainError> {
        Ok(self.active(|e| e.timestamp.is_some_and(|t| t < cutoff)))
    }

    async fn find_all(&self) -> Result<Vec<Event>, DomainError> {
        Ok(self.active(|_| true))
    }
}

/// An event repository that always returns a storage error.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn insert(&self, _event: Event) -> Result<Event, DomainError> {
        Err(connection_refused())
    }

    async fn save(&self, _event: &Event) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<Event>, DomainError> {
        Err(connection_refused())
    }

    async fn find_by_type(&self, _event_type: EventType) -> Result<Vec<Event>, DomainError> {
        Err(connection_refused())
    }

    async fn find_before(&self, _cutoff: NaiveDateTime) -> Result<Vec<Event>, DomainError> {
        Err(connection_refused())
    }

    async fn find_all(&self) -> Result<Vec<Event>, DomainError> {
        Err(connection_refused())
    }
}

#[derive(Debug)]
struct UserTable {
    rows: BTreeMap<i64, UserRecord>,
    next_id: i64,
}

/// A user store kept in a `BTreeMap` keyed by id.
#[derive(Debug)]
pub struct InMemoryUserRepository {
    table: Mutex<UserTable>,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self {
            table: Mutex::new(UserTable {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl InMemoryUserRepository {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every stored user ordered by id.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn users(&self) -> Vec<UserRecord> {
        self.table.lock().unwrap().rows.values().cloned().collect()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, DomainError> {
        Ok(self.table.lock().unwrap().rows.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DomainError> {
        Ok(self
            .table
            .lock()
            .unwrap()
            .rows
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, DomainError> {
        let mut table = self.table.lock().unwrap();
        let id = user.id.unwrap_or(table.next_id);
        if table.rows.contains_key(&id) {
            return Err(DomainError::Storage(format!(
                "duplicate key value violates unique constraint users_pkey ({id})"
            )));
        }
        table.next_id = table.next_id.max(id + 1);
        let record = UserRecord {
            id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        };
        table.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, user: &UserRecord) -> Result<bool, DomainError> {
        let mut table = self.table.lock().unwrap();
        match table.rows.get_mut(&user.id) {
            Some(row) => {
                *row = user.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, DomainError> {
        Ok(self.table.lock().unwrap().rows.remove(&id).is_some())
    }

    async fn delete_all(&self) -> Result<u64, DomainError> {
        let mut table = self.table.lock().unwrap();
        let removed = table.rows.len() as u64;
        table.rows.clear();
        Ok(removed)
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, DomainError> {
        Ok(self.users())
    }
}

/// A user repository that always returns a storage error.
#[derive(Debug)]
pub struct FailingUserRepository;

#[async_trait]
impl UserRepository for FailingUserRepository {
    async fn find_by_id(&self, _id: i64) -> Result<Option<UserRecord>, DomainError> {
        Err(connection_refused())
    }

    async fn find_by_username(&self, _username: &str) -> Result<Option<UserRecord>, DomainError> {
        Err(connection_refused())
    }

    async fn insert(&self, _user: NewUser) -> Result<UserRecord, DomainError> {
        Err(connection_refused())
    }

    async fn update(&self, _user: &UserRecord) -> Result<bool, DomainError> {
        Err(connection_refused())
    }

    async fn delete_by_id(&self, _id: i64) -> Result<bool, DomainError> {
        Err(connection_refused())
    }

    async fn delete_all(&self) -> Result<u64, DomainError> {
        Err(connection_refused())
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, DomainError> {
        Err(connection_refused())
    }
}

/// An in-memory user store whose first `failures` calls return a storage
/// error. Used to exercise retry paths.
#[derive(Debug)]
pub struct FlakyUserRepository {
    inner: InMemoryUserRepository,
    failures_left: AtomicU32,
}

impl FlakyUserRepository {
    /// Create a store that fails the next `failures` calls.
    #[must_use]
    pub fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryUserRepository::new(),
            failures_left: AtomicU32::new(failures),
        }
    }

    /// Returns a snapshot of every stored user ordered by id.
    pub fn users(&self) -> Vec<UserRecord> {
        self.inner.users()
    }

    fn trip(&self) -> Result<(), DomainError> {
        let tripped = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            Err(connection_refused())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserRepository for FlakyUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, DomainError> {
        self.trip()?;
        self.inner.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DomainError> {
        self.trip()?;
        self.inner.find_by_username(username).await
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, DomainError> {
        self.trip()?;
        self.inner.insert(user).await
    }

    async fn update(&self, user: &UserRecord) -> Result<bool, DomainError> {
        self.trip()?;
        self.inner.update(user).await
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, DomainError> {
        self.trip()?;
        self.inner.delete_by_id(id).await
    }

    async fn delete_all(&self) -> Result<u64, DomainError> {
        self.trip()?;
        self.inner.delete_all().await
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, DomainError> {
        self.trip()?;
        self.inner.list_all().await
    }
}
