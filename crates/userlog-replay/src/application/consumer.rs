//! Consumes events from a topic subscription and replays them.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use userlog_core::broker::{Delivery, MessagePublisher, Subscription};
use userlog_core::error::DomainError;
use userlog_core::event::Event;
use userlog_core::handler::EventHandler;
use userlog_core::retry::RetryPolicy;

use crate::application::event_log_service::EventLogService;

/// Where undeliverable payloads are forwarded.
#[derive(Clone)]
pub struct DeadLetter {
    publisher: Arc<dyn MessagePublisher>,
    topic: String,
}

impl DeadLetter {
    /// Forwards failed payloads to `topic` on `publisher`.
    #[must_use]
    pub fn new(publisher: Arc<dyn MessagePublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }
}

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Recorded in the log and handled.
    Applied,
    /// Not a decodable event, or soft-deleted in the log; never handled.
    Discarded,
    /// Decoded, but recording or handling failed.
    Failed,
}

/// Logs each payload arriving on a dead-letter subscription until it closes.
/// Returns how many were seen.
pub async fn drain_dead_letters<S>(mut subscription: S) -> u64
where
    S: Subscription,
{
    let mut drained = 0;
    while let Some(delivery) = subscription.next_delivery().await {
        drained += 1;
        error!(
            dead_letter_topic = %delivery.topic,
            payload = %delivery.payload,
            "dead-lettered payload"
        );
    }
    drained
}

/// Running totals for a consumer loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    /// Deliveries recorded and handled.
    pub applied: u64,
    /// Deliveries dropped without handling.
    pub discarded: u64,
    /// Deliveries whose recording or handling failed.
    pub failed: u64,
}

impl ConsumerStats {
    fn record(&mut self, outcome: ConsumeOutcome) {
        match outcome {
            ConsumeOutcome::Applied => self.applied += 1,
            ConsumeOutcome::Discarded => self.discarded += 1,
            ConsumeOutcome::Failed => self.failed += 1,
        }
    }
}

/// Decodes deliveries, appends them to the event log and hands them to an
/// `EventHandler`. Failures never stop the loop.
pub struct EventConsumer {
    event_log: EventLogService,
    handler: Arc<dyn EventHandler>,
    retry: RetryPolicy,
    dead_letter: Option<DeadLetter>,
}

impl EventConsumer {
    /// Creates a consumer that tries each step once and drops failures.
    #[must_use]
    pub fn new(event_log: EventLogService, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            event_log,
            handler,
            retry: RetryPolicy::no_retry(),
            dead_letter: None,
        }
    }

    /// Retries transient recording and handling failures under `retry`.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Forwards discarded and failed payloads to `dead_letter`.
    #[must_use]
    pub fn with_dead_letter(mut self, dead_letter: DeadLetter) -> Self {
        self.dead_letter = Some(dead_letter);
        self
    }

    /// Processes deliveries one at a time until the subscription closes.
    pub async fn run<S>(&self, mut subscription: S) -> ConsumerStats
    where
        S: Subscription,
    {
        info!("event consumer started");
        let mut stats = ConsumerStats::default();
        while let Some(delivery) = subscription.next_delivery().await {
            stats.record(self.process(&delivery).await);
        }
        info!(
            applied = stats.applied,
            discarded = stats.discarded,
            failed = stats.failed,
            "event consumer stopped"
        );
        stats
    }

    /// Processes a single delivery. Never returns an error.
    #[instrument(skip(self, delivery), fields(topic = %delivery.topic))]
    pub async fn process(&self, delivery: &Delivery) -> ConsumeOutcome {
        debug!(payload = %delivery.payload, "received message");

        let event = match Event::from_json(&delivery.payload) {
            Ok(event) => event,
            Err(err) => {
                error!(error = %err, payload = %delivery.payload, "failed to deserialize event");
                self.dead_letter(delivery).await;
                return ConsumeOutcome::Discarded;
            }
        };

        let recorded = match self.record(event).await {
            Ok(event) => event,
            Err(err) => {
                error!(error = %err, "failed to record event in log");
                self.dead_letter(delivery).await;
                return ConsumeOutcome::Failed;
            }
        };

        if recorded.deleted {
            warn!(event_id = ?recorded.id, "event is soft-deleted in the log, not replaying");
            return ConsumeOutcome::Discarded;
        }

        let handler = &self.handler;
        let target = &recorded;
        match self
            .retry
            .run("handle event", move || handler.handle_event(target))
            .await
        {
            Ok(()) => {
                info!(event_id = ?recorded.id, event_type = %recorded.event_type, "event consumed");
                ConsumeOutcome::Applied
            }
            Err(err) => {
                error!(
                    event_id = ?recorded.id,
                    event_type = %recorded.event_type,
                    error = %err,
                    "failed to handle event"
                );
                self.dead_letter(delivery).await;
                ConsumeOutcome::Failed
            }
        }
    }

    /// Appends `event` to the log unless an event with its id is already there.
    async fn record(&self, event: Event) -> Result<Event, DomainError> {
        if let Some(id) = event.id {
            match self.event_log.get_event_by_id(id).await {
                Ok(existing) => {
                    debug!(event_id = %id, "event already in log");
                    return Ok(existing);
                }
                Err(DomainError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        let log = &self.event_log;
        let pending = &event;
        self.retry
            .run("record event", move || log.create_event(pending.clone()))
            .await
    }

    async fn dead_letter(&self, delivery: &Delivery) {
        let Some(dead_letter) = &self.dead_letter else {
            return;
        };
        match dead_letter
            .publisher
            .send(&dead_letter.topic, &delivery.payload)
            .await
        {
            Ok(()) => warn!(dead_letter_topic = %dead_letter.topic, "payload dead-lettered"),
            Err(err) => error!(
                dead_letter_topic = %dead_letter.topic,
                error = %err,
                "failed to dead-letter payload"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{NaiveDate, NaiveDateTime};
    use userlog_broker::InMemoryBroker;
    use userlog_core::event::EventType;
    use userlog_core::repository::EventRepository;
    use userlog_test_support::{
        FailingEventRepository, FixedClock, FlakyUserRepository, InMemoryEventRepository,
        InMemoryUserRepository, RecordingEventHandler, RecordingPublisher,
    };

    use crate::application::publisher::EventPublisher;
    use crate::application::replay_engine::ReplayEngine;

    const TOPIC: &str = "user-events";
    const DLQ: &str = "user-events-dlq";

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn log_over(repo: Arc<dyn EventRepository>) -> EventLogService {
        EventLogService::new(repo, Arc::new(FixedClock::standard()))
    }

    fn delivery(payload: &str) -> Delivery {
        Delivery {
            topic: TOPIC.into(),
            payload: payload.into(),
        }
    }

    fn wire(event: &Event) -> Delivery {
        delivery(&serde_json::to_string(event).unwrap())
    }

    fn alice_created() -> Event {
        Event::new(
            EventType::Creation,
            r#"{"username":"alice","email":"alice@x.com"}"#,
            at(9),
        )
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            multiplier: 1,
        }
    }

    #[tokio::test]
    async fn test_invalid_type_is_discarded_without_handling() {
        // Arrange
        let events = Arc::new(InMemoryEventRepository::new());
        let handler = Arc::new(RecordingEventHandler::new());
        let consumer = EventConsumer::new(log_over(events.clone()), handler.clone());

        // Act
        let outcome = consumer
            .process(&delivery(
                r#"{"type":"INVALID_TYPE","description":"{}","timestamp":"2026-01-15T09:00:00"}"#,
            ))
            .await;

        // Assert
        assert_eq!(outcome, ConsumeOutcome::Discarded);
        assert!(handler.handled().is_empty());
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn test_non_json_payload_is_discarded() {
        let handler = Arc::new(RecordingEventHandler::new());
        let consumer =
            EventConsumer::new(log_over(Arc::new(InMemoryEventRepository::new())), handler.clone());

        let outcome = consumer.process(&delivery("not json")).await;

        assert_eq!(outcome, ConsumeOutcome::Discarded);
        assert!(handler.handled().is_empty());
    }

    #[tokio::test]
    async fn test_valid_event_is_recorded_then_handled() {
        // Arrange
        let events = Arc::new(InMemoryEventRepository::new());
        let handler = Arc::new(RecordingEventHandler::new());
        let consumer = EventConsumer::new(log_over(events.clone()), handler.clone());

        // Act
        let outcome = consumer.process(&wire(&alice_created())).await;

        // Assert
        assert_eq!(outcome, ConsumeOutcome::Applied);
        let logged = events.events();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].event_type, EventType::Creation);
        assert_eq!(logged[0].created_date, Some(FixedClock::standard().0));
        assert_eq!(handler.handled(), logged);
    }

    #[tokio::test]
    async fn test_redelivered_event_with_known_id_is_not_logged_twice() {
        let events = Arc::new(InMemoryEventRepository::new());
        let handler = Arc::new(RecordingEventHandler::new());
        let consumer = EventConsumer::new(log_over(events.clone()), handler.clone());
        consumer.process(&wire(&alice_created())).await;
        let stored = events.events().remove(0);

        let outcome = consumer.process(&wire(&stored)).await;

        assert_eq!(outcome, ConsumeOutcome::Applied);
        assert_eq!(events.events().len(), 1);
        assert_eq!(handler.handled().len(), 2);
    }

    #[tokio::test]
    async fn test_redelivered_soft_deleted_event_is_not_replayed() {
        // Arrange
        let events = Arc::new(InMemoryEventRepository::new());
        let log = log_over(events.clone());
        let handler = Arc::new(RecordingEventHandler::new());
        let consumer = EventConsumer::new(log.clone(), handler.clone());
        consumer.process(&wire(&alice_created())).await;
        let stored = events.events().remove(0);
        log.delete_event_by_id(stored.id.unwrap()).await.unwrap();

        // Act
        let outcome = consumer.process(&wire(&stored)).await;

        // Assert
        assert_eq!(outcome, ConsumeOutcome::Discarded);
        assert_eq!(handler.handled().len(), 1);
        assert!(log.get_all_events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dead_letters_are_drained_from_broker() {
        // Arrange
        let broker = InMemoryBroker::new();
        let dead_letters = broker.subscribe(DLQ).await;
        let consumer = EventConsumer::new(
            log_over(Arc::new(InMemoryEventRepository::new())),
            Arc::new(RecordingEventHandler::new()),
        )
        .with_dead_letter(DeadLetter::new(Arc::new(broker.clone()), DLQ));
        for _ in 0..100 {
            consumer.process(&delivery("garbage")).await;
        }
        broker.close().await;

        // Act
        let drained = drain_dead_letters(dead_letters).await;

        // Assert
        assert_eq!(drained, 100);
        assert_eq!(broker.backlog_len(DLQ).await, 0);
    }

    #[tokio::test]
    async fn test_handler_failure_is_swallowed_and_dead_lettered() {
        // Arrange
        let dlq = Arc::new(RecordingPublisher::new());
        let handler = Arc::new(RecordingEventHandler::failing());
        let consumer =
            EventConsumer::new(log_over(Arc::new(InMemoryEventRepository::new())), handler.clone())
                .with_dead_letter(DeadLetter::new(dlq.clone(), DLQ));
        let message = wire(&alice_created());

        // Act
        let outcome = consumer.process(&message).await;

        // Assert
        assert_eq!(outcome, ConsumeOutcome::Failed);
        assert_eq!(handler.handled().len(), 1);
        let sent = dlq.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, DLQ);
        assert_eq!(sent[0].payload, message.payload);
    }

    #[tokio::test]
    async fn test_transient_handler_failure_is_retried() {
        let handler = Arc::new(RecordingEventHandler::failing());
        let consumer =
            EventConsumer::new(log_over(Arc::new(InMemoryEventRepository::new())), handler.clone())
                .with_retry(fast_retry(3));

        let outcome = consumer.process(&wire(&alice_created())).await;

        assert_eq!(outcome, ConsumeOutcome::Failed);
        assert_eq!(handler.handled().len(), 3);
    }

    #[tokio::test]
    async fn test_log_failure_skips_handling() {
        let handler = Arc::new(RecordingEventHandler::new());
        let consumer = EventConsumer::new(log_over(Arc::new(FailingEventRepository)), handler.clone());

        let outcome = consumer.process(&wire(&alice_created())).await;

        assert_eq!(outcome, ConsumeOutcome::Failed);
        assert!(handler.handled().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_is_dead_lettered() {
        let dlq = Arc::new(RecordingPublisher::new());
        let consumer = EventConsumer::new(
            log_over(Arc::new(InMemoryEventRepository::new())),
            Arc::new(RecordingEventHandler::new()),
        )
        .with_dead_letter(DeadLetter::new(dlq.clone(), DLQ));

        consumer.process(&delivery("{")).await;

        assert_eq!(dlq.sent().len(), 1);
        assert_eq!(dlq.sent()[0].payload, "{");
    }

    #[tokio::test]
    async fn test_run_continues_past_failures_until_closed() {
        // Arrange
        let broker = InMemoryBroker::new();
        let subscription = broker.subscribe(TOPIC).await;
        broker.send(TOPIC, "garbage").await.unwrap();
        broker
            .send(TOPIC, &serde_json::to_string(&alice_created()).unwrap())
            .await
            .unwrap();
        broker.close().await;
        let handler = Arc::new(RecordingEventHandler::new());
        let consumer =
            EventConsumer::new(log_over(Arc::new(InMemoryEventRepository::new())), handler.clone());

        // Act
        let stats = consumer.run(subscription).await;

        // Assert
        assert_eq!(
            stats,
            ConsumerStats {
                applied: 1,
                discarded: 1,
                failed: 0,
            }
        );
        assert_eq!(handler.handled().len(), 1);
    }

    #[tokio::test]
    async fn test_consumer_retries_flaky_store_through_replay_engine() {
        let users = Arc::new(FlakyUserRepository::new(1));
        let log = log_over(Arc::new(InMemoryEventRepository::new()));
        let engine = Arc::new(ReplayEngine::new(users.clone(), log.clone()));
        let consumer = EventConsumer::new(log, engine).with_retry(fast_retry(2));

        let outcome = consumer.process(&wire(&alice_created())).await;

        assert_eq!(outcome, ConsumeOutcome::Applied);
        assert_eq!(users.users().len(), 1);
    }

    #[tokio::test]
    async fn test_published_events_rebuild_to_live_state() {
        // Arrange
        let broker = InMemoryBroker::new();
        let clock = Arc::new(FixedClock::standard());
        let publisher = EventPublisher::new(Arc::new(broker.clone()), clock.clone(), TOPIC);
        let users = Arc::new(InMemoryUserRepository::new());
        let log = EventLogService::new(Arc::new(InMemoryEventRepository::new()), clock);
        let engine = Arc::new(ReplayEngine::new(users.clone(), log.clone()));
        let consumer = EventConsumer::new(log, engine.clone());
        let subscription = broker.subscribe(TOPIC).await;

        let alice = serde_json::json!({"id": 1, "username": "alice", "email": "alice@x.com"});
        let bob = serde_json::json!({"id": 2, "username": "bob", "email": "bob@x.com"});
        let alicia = serde_json::json!({"id": 1, "username": "alicia", "email": "alicia@x.com"});
        publisher.publish(EventType::Creation, &alice).await.unwrap();
        publisher.publish(EventType::Creation, &bob).await.unwrap();
        publisher.publish(EventType::Edition, &alicia).await.unwrap();
        publisher.publish(EventType::Deletion, &bob).await.unwrap();
        publisher
            .publish(EventType::Integration, "crm sync")
            .await
            .unwrap();
        broker.close().await;

        // Act
        let stats = consumer.run(subscription).await;
        let live = users.users();
        let report = engine.rebuild_all().await.unwrap();

        // Assert
        assert_eq!(stats.applied, 5);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].username, "alicia");
        assert_eq!(report.events_replayed, 5);
        assert_eq!(users.users(), live);
    }
}
