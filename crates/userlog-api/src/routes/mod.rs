//! Route modules, one per resource.

pub mod events;
pub mod health;
pub mod rebuild;
pub mod users;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;
    use userlog_core::repository::{EventRepository, UserRepository};
    use userlog_replay::application::event_log_service::EventLogService;
    use userlog_replay::application::publisher::EventPublisher;
    use userlog_replay::application::replay_engine::ReplayEngine;
    use userlog_replay::application::user_service::UserService;
    use userlog_test_support::{
        FixedClock, InMemoryEventRepository, InMemoryUserRepository, RecordingPublisher,
    };

    use crate::state::AppState;

    /// In-memory stores behind an `AppState`.
    pub(crate) struct Harness {
        pub users: Arc<InMemoryUserRepository>,
        pub events: Arc<InMemoryEventRepository>,
        pub broker: Arc<RecordingPublisher>,
        pub state: AppState,
    }

    pub(crate) fn state_over(
        users: Arc<dyn UserRepository>,
        events: Arc<dyn EventRepository>,
        broker: Arc<RecordingPublisher>,
    ) -> AppState {
        let clock = Arc::new(FixedClock::standard());
        let event_log = EventLogService::new(events, clock.clone());
        let publisher = EventPublisher::new(broker, clock.clone(), "user-events");
        let replay = Arc::new(ReplayEngine::new(users.clone(), event_log.clone()));
        AppState::new(UserService::new(users, publisher, clock), event_log, replay)
    }

    pub(crate) fn harness() -> Harness {
        let users = Arc::new(InMemoryUserRepository::new());
        let events = Arc::new(InMemoryEventRepository::new());
        let broker = Arc::new(RecordingPublisher::new());
        let state = state_over(users.clone(), events.clone(), broker.clone());
        Harness {
            users,
            events,
            broker,
            state,
        }
    }

    /// Sends one request and returns the status and JSON body (`Null` when
    /// the body is empty).
    pub(crate) async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<&Value>,
    ) -> (StatusCode, Value) {
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
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
