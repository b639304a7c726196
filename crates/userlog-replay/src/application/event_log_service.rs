//! CRUD façade over the event log.
//!
//! Stamps audit dates, keeps deletes soft and turns missing records into the
//! per-operation result each caller expects. Store failures always propagate.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{info, warn};
use userlog_core::clock::Clock;
use userlog_core::error::DomainError;
use userlog_core::event::{Event, EventPatch, EventType};
use userlog_core::repository::EventRepository;
use uuid::Uuid;

/// Service over an `EventRepository`.
#[derive(Clone)]
pub struct EventLogService {
    repo: Arc<dyn EventRepository>,
    clock: Arc<dyn Clock>,
}

impl EventLogService {
    /// Creates a new `EventLogService`.
    #[must_use]
    pub fn new(repo: Arc<dyn EventRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Stamps `createdDate`/`updatedDate`, clears `deleted` and persists the
    /// event. Returns the stored copy with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Storage` if the write fails.
    pub async fn create_event(&self, mut event: Event) -> Result<Event, DomainError> {
        let now = self.clock.now();
        event.created_date = Some(now);
        event.updated_date = Some(now);
        event.deleted = false;

        let saved = self.repo.insert(event).await?;
        info!(event_id = ?saved.id, event_type = %saved.event_type, "event created");
        Ok(saved)
    }

    /// Loads an event by id, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no event has this id, or
    /// `DomainError::Storage` if the read fails.
    pub async fn get_event_by_id(&self, id: Uuid) -> Result<Event, DomainError> {
        match self.repo.find_by_id(id).await? {
            Some(event) => Ok(event),
            None => {
                warn!(event_id = %id, "no event found");
                Err(DomainError::NotFound(format!("event {id}")))
            }
        }
    }

    /// Loads active events whose type name is `name`, in log order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `name` is not a known event
    /// type, or `DomainError::Storage` if the read fails.
    pub async fn get_event_by_name(&self, name: &str) -> Result<Vec<Event>, DomainError> {
        let event_type: EventType = name
            .parse()
            .map_err(|_| DomainError::InvalidArgument(format!("unknown event name '{name}'")))?;
        let events = self.repo.find_by_type(event_type).await?;
        if events.is_empty() {
            warn!(name, "no events found with name");
        }
        Ok(events)
    }

    /// Loads active events with a timestamp strictly before `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `timestamp` is `None`, or
    /// `DomainError::Storage` if the read fails.
    pub async fn get_events_up_to(
        &self,
        timestamp: Option<NaiveDateTime>,
    ) -> Result<Vec<Event>, DomainError> {
        let cutoff = timestamp
            .ok_or_else(|| DomainError::InvalidArgument("timestamp cannot be absent".into()))?;
        let events = self.repo.find_before(cutoff).await?;
        info!(count = events.len(), %cutoff, "events found before cutoff");
        Ok(events)
    }

    /// Loads every active event in log order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Storage` if the read fails, or
    /// `DomainError::UnknownEventType` if a stored type is not recognized.
    pub async fn get_all_events(&self) -> Result<Vec<Event>, DomainError> {
        let events = self.repo.find_all().await?;
        info!(count = events.len(), "retrieved events");
        Ok(events)
    }

    /// Soft-deletes an event. A missing id is a logged no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Storage` if the read or write fails.
    pub async fn delete_event_by_id(&self, id: Uuid) -> Result<(), DomainError> {
        let Some(mut event) = self.repo.find_by_id(id).await? else {
            warn!(event_id = %id, "no event found to delete");
            return Ok(());
        };

        event.deleted = true;
        event.updated_date = Some(self.clock.now());
        self.repo.save(&event).await?;
        info!(event_id = %id, "event marked as deleted");
        Ok(())
    }

    /// Replaces the type, description and timestamp of an event. Returns
    /// `None` if no event has this id. `createdDate` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Storage` if the read or write fails.
    pub async fn update_event(
        &self,
        id: Uuid,
        patch: EventPatch,
    ) -> Result<Option<Event>, DomainError> {
        let Some(mut event) = self.repo.find_by_id(id).await? else {
            warn!(event_id = %id, "no event found to update");
            return Ok(None);
        };

        event.event_type = patch.event_type;
        event.description = patch.description;
        event.timestamp = patch.timestamp;
        event.updated_date = Some(self.clock.now());
        self.repo.save(&event).await?;
        info!(event_id = %id, "event updated");
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use userlog_test_support::{FailingEventRepository, FixedClock, InMemoryEventRepository};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn service_with(repo: Arc<dyn EventRepository>, now: NaiveDateTime) -> EventLogService {
        EventLogService::new(repo, Arc::new(FixedClock(now)))
    }

    fn creation(hour: u32) -> Event {
        Event::new(
            EventType::Creation,
            r#"{"username":"alice","email":"alice@x.com"}"#,
            at(hour),
        )
    }

    #[tokio::test]
    async fn test_create_event_stamps_audit_fields_and_assigns_id() {
        // Arrange
        let repo = Arc::new(InMemoryEventRepository::new());
        let service = service_with(repo.clone(), at(12));
        let mut event = creation(9);
        event.deleted = true;

        // Act
        let saved = service.create_event(event).await.unwrap();

        // Assert
        assert!(saved.id.is_some());
        assert_eq!(saved.created_date, Some(at(12)));
        assert_eq!(saved.updated_date, Some(at(12)));
        assert!(!saved.deleted);
        assert_eq!(saved.timestamp, Some(at(9)));
        assert_eq!(repo.events(), vec![saved]);
    }

    #[tokio::test]
    async fn test_create_event_surfaces_storage_error() {
        let service = service_with(Arc::new(FailingEventRepository), at(12));

        let result = service.create_event(creation(9)).await;

        assert!(matches!(result, Err(DomainError::Storage(_))));
    }

    #[tokio::test]
    async fn test_get_event_by_id_returns_not_found_for_unknown_id() {
        let service = service_with(Arc::new(InMemoryEventRepository::new()), at(12));
        let id = Uuid::new_v4();

        match service.get_event_by_id(id).await {
            Err(DomainError::NotFound(msg)) => assert!(msg.contains(&id.to_string())),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_events_up_to_rejects_absent_timestamp() {
        let service = service_with(Arc::new(InMemoryEventRepository::new()), at(12));

        let result = service.get_events_up_to(None).await;

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_get_events_up_to_returns_strictly_earlier_events_in_order() {
        // Arrange
        let repo = Arc::new(InMemoryEventRepository::with_events(vec![
            creation(8),
            creation(9),
            creation(10),
        ]));
        let service = service_with(repo, at(12));

        // Act
        let events = service.get_events_up_to(Some(at(10))).await.unwrap();

        // Assert
        let times: Vec<_> = events.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![Some(at(8)), Some(at(9))]);
    }

    #[tokio::test]
    async fn test_get_event_by_name_filters_by_type_name() {
        let mut integration = creation(9);
        integration.event_type = EventType::Integration;
        let repo = Arc::new(InMemoryEventRepository::with_events(vec![
            creation(8),
            integration,
        ]));
        let service = service_with(repo, at(12));

        let events = service.get_event_by_name("INTEGRATION").await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Integration);
    }

    #[tokio::test]
    async fn test_get_event_by_name_rejects_unknown_name() {
        let service = service_with(Arc::new(InMemoryEventRepository::new()), at(12));

        let result = service.get_event_by_name("RENAMING").await;

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_delete_event_by_id_is_soft() {
        // Arrange
        let repo = Arc::new(InMemoryEventRepository::new());
        let service = service_with(repo.clone(), at(12));
        let saved = service.create_event(creation(9)).await.unwrap();
        let id = saved.id.unwrap();
        let later = service_with(repo.clone(), at(12) + Duration::hours(1));

        // Act
        later.delete_event_by_id(id).await.unwrap();

        // Assert
        let stored = later.get_event_by_id(id).await.unwrap();
        assert!(stored.deleted);
        assert_eq!(stored.created_date, Some(at(12)));
        assert_eq!(stored.updated_date, Some(at(13)));
        assert!(later.get_all_events().await.unwrap().is_empty());
        assert_eq!(repo.events().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_event_by_id_unknown_is_noop() {
        let repo = Arc::new(InMemoryEventRepository::with_events(vec![creation(9)]));
        let service = service_with(repo.clone(), at(12));

        service.delete_event_by_id(Uuid::new_v4()).await.unwrap();

        assert!(repo.events().iter().all(|e| !e.deleted));
    }

    #[tokio::test]
    async fn test_update_event_replaces_fields_and_keeps_created_date() {
        // Arrange
        let repo = Arc::new(InMemoryEventRepository::new());
        let saved = service_with(repo.clone(), at(12))
            .create_event(creation(9))
            .await
            .unwrap();
        let service = service_with(repo, at(14));
        let patch = EventPatch {
            event_type: EventType::Edition,
            description: r#"{"username":"alice","email":"alice@y.com"}"#.into(),
            timestamp: Some(at(11)),
        };

        // Act
        let updated = service
            .update_event(saved.id.unwrap(), patch)
            .await
            .unwrap()
            .unwrap();

        // Assert
        assert_eq!(updated.event_type, EventType::Edition);
        assert!(updated.description.contains("alice@y.com"));
        assert_eq!(updated.timestamp, Some(at(11)));
        assert_eq!(updated.created_date, Some(at(12)));
        assert_eq!(updated.updated_date, Some(at(14)));
    }

    #[tokio::test]
    async fn test_update_event_unknown_returns_none() {
        let service = service_with(Arc::new(InMemoryEventRepository::new()), at(12));
        let patch = EventPatch {
            event_type: EventType::Edition,
            description: "{}".into(),
            timestamp: None,
        };

        let result = service.update_event(Uuid::new_v4(), patch).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_all_events_surfaces_storage_error() {
        let service = service_with(Arc::new(FailingEventRepository), at(12));

        assert!(matches!(
            service.get_all_events().await,
            Err(DomainError::Storage(_))
        ));
    }
}
