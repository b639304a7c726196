//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use userlog_core::error::DomainError;
use userlog_core::event::{Event, EventType};
use userlog_core::repository::EventRepository;

use crate::storage_error;

const SELECT_COLUMNS: &str =
    "SELECT id, event_type, description, event_timestamp, created_date, updated_date, deleted FROM events";

/// A row of the `events` table.
#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    event_type: String,
    description: String,
    event_timestamp: Option<NaiveDateTime>,
    created_date: Option<NaiveDateTime>,
    updated_date: Option<NaiveDateTime>,
    deleted: bool,
}

impl TryFrom<EventRow> for Event {
    type Error = DomainError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.id),
            event_type: row.event_type.parse()?,
            description: row.description,
            timestamp: row.event_timestamp,
            created_date: row.created_date,
            updated_date: row.updated_date,
            deleted: row.deleted,
        })
    }
}

fn into_events(rows: Vec<EventRow>) -> Result<Vec<Event>, DomainError> {
    rows.into_iter().map(Event::try_from).collect()
}

/// PostgreSQL-backed event log.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn insert(&self, mut event: Event) -> Result<Event, DomainError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO events \
             (id, event_type, description, event_timestamp, created_date, updated_date, deleted) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(event.event_type.as_str())
        .bind(&event.description)
        .bind(event.timestamp)
        .bind(event.created_date)
        .bind(event.updated_date)
        .bind(event.deleted)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        debug!(event_id = %id, event_type = %event.event_type, "event inserted");
        event.id = Some(id);
        Ok(event)
    }

    async fn save(&self, event: &Event) -> Result<(), DomainError> {
        let id = event
            .id
            .ok_or_else(|| DomainError::InvalidArgument("cannot save an event without id".into()))?;

        let result = sqlx::query(
            "UPDATE events SET event_type = $2, description = $3, event_timestamp = $4, \
             created_date = $5, updated_date = $6, deleted = $7 WHERE id = $1",
        )
        .bind(id)
        .bind(event.event_type.as_str())
        .bind(&event.description)
        .bind(event.timestamp)
        .bind(event.created_date)
        .bind(event.updated_date)
        .bind(event.deleted)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("event {id}")));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, DomainError> {
        let row = sqlx::query_as::<_, EventRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(Event::try_from).transpose()
    }

    async fn find_by_type(&self, event_type: EventType) -> Result<Vec<Event>, DomainError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "{SELECT_COLUMNS} WHERE event_type = $1 AND NOT deleted ORDER BY seq ASC"
        ))
        .bind(event_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        into_events(rows)
    }

    async fn find_before(&self, cutoff: NaiveDateTime) -> Result<Vec<Event>, DomainError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "{SELECT_COLUMNS} WHERE event_timestamp < $1 AND NOT deleted ORDER BY seq ASC"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        into_events(rows)
    }

    async fn find_all(&self) -> Result<Vec<Event>, DomainError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "{SELECT_COLUMNS} WHERE NOT deleted ORDER BY seq ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        into_events(rows)
    }
}
