//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use userlog_broker::{BrokerSubscription, InMemoryBroker};
use userlog_core::clock::Clock;
use userlog_core::repository::{EventRepository, UserRepository};
use userlog_event_store::{PgEventRepository, PgUserRepository};
use userlog_replay::application::consumer::EventConsumer;
use userlog_replay::application::event_log_service::EventLogService;
use userlog_replay::application::publisher::EventPublisher;
use userlog_replay::application::replay_engine::ReplayEngine;
use userlog_replay::application::user_service::UserService;
use userlog_test_support::{FixedClock, InMemoryEventRepository, InMemoryUserRepository};

use userlog_api::state::AppState;

pub const TOPIC: &str = "user-events";

/// A router plus the consumer side of the same wiring.
pub struct TestSystem {
    pub broker: InMemoryBroker,
    pub subscription: BrokerSubscription,
    pub consumer: EventConsumer,
    state: AppState,
}

impl TestSystem {
    /// A fresh router over the shared state. Each request consumes one.
    pub fn app(&self) -> Router {
        userlog_api::app(self.state.clone())
    }

    /// Closes the broker and processes everything published so far.
    pub async fn drain(self) -> Router {
        self.broker.close().await;
        self.consumer.run(self.subscription).await;
        userlog_api::app(self.state)
    }
}

async fn build(users: Arc<dyn UserRepository>, events: Arc<dyn EventRepository>) -> TestSystem {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::standard());
    let broker = InMemoryBroker::new();
    let subscription = broker.subscribe(TOPIC).await;

    let event_log = EventLogService::new(events, clock.clone());
    let replay = Arc::new(ReplayEngine::new(users.clone(), event_log.clone()));
    let consumer = EventConsumer::new(event_log.clone(), replay.clone());
    let publisher = EventPublisher::new(Arc::new(broker.clone()), clock.clone(), TOPIC);
    let state = AppState::new(UserService::new(users, publisher, clock), event_log, replay);

    TestSystem {
        broker,
        subscription,
        consumer,
        state,
    }
}

/// Wires the system over PostgreSQL stores.
pub async fn build_pg_system(pool: PgPool) -> TestSystem {
    build(
        Arc::new(PgUserRepository::new(pool.clone())),
        Arc::new(PgEventRepository::new(pool)),
    )
    .await
}

/// Wires the system over in-memory stores.
pub async fn build_in_memory_system() -> TestSystem {
    build(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryEventRepository::new()),
    )
    .await
}

/// Send a request with an optional JSON body and return the response.
pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(json).unwrap())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}
