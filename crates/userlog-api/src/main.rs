//! Userlog server entry point: admin API plus the event consumer task.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use userlog_api::config::AppConfig;
use userlog_api::error::AppError;
use userlog_api::state::AppState;
use userlog_broker::InMemoryBroker;
use userlog_core::clock::{Clock, SystemClock};
use userlog_event_store::schema::run_migrations;
use userlog_event_store::{PgEventRepository, PgUserRepository};
use userlog_replay::application::consumer::{DeadLetter, EventConsumer, drain_dead_letters};
use userlog_replay::application::event_log_service::EventLogService;
use userlog_replay::application::publisher::EventPublisher;
use userlog_replay::application::replay_engine::ReplayEngine;
use userlog_replay::application::user_service::UserService;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Userlog server");

    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    run_migrations(&pool).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let users = Arc::new(PgUserRepository::new(pool.clone()));
    let event_log = EventLogService::new(Arc::new(PgEventRepository::new(pool)), clock.clone());
    let broker = InMemoryBroker::new();

    let replay = Arc::new(ReplayEngine::new(users.clone(), event_log.clone()));
    let mut consumer = EventConsumer::new(event_log.clone(), replay.clone()).with_retry(config.retry);
    let mut dead_letter_task = None;
    if let Some(topic) = &config.dead_letter_topic {
        let dead_letters = broker.subscribe(topic).await;
        dead_letter_task = Some(tokio::spawn(drain_dead_letters(dead_letters)));
        consumer = consumer.with_dead_letter(DeadLetter::new(Arc::new(broker.clone()), topic.clone()));
    }
    let subscription = broker.subscribe(&config.events_topic).await;
    let consumer_task = tokio::spawn(async move { consumer.run(subscription).await });

    let publisher = EventPublisher::new(Arc::new(broker.clone()), clock.clone(), &config.events_topic)
        .with_retry(config.retry);
    let app_state = AppState::new(UserService::new(users, publisher, clock), event_log, replay);
    let app = userlog_api::app(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!(topic = %config.events_topic, "Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            // Without a signal handler, run until killed.
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("HTTP server stopped, draining consumer");
    broker.close_topic(&config.events_topic).await;
    match consumer_task.await {
        Ok(stats) => tracing::info!(
            applied = stats.applied,
            discarded = stats.discarded,
            failed = stats.failed,
            "consumer drained"
        ),
        Err(err) => tracing::error!(error = %err, "consumer task panicked"),
    }
    broker.close().await;
    if let Some(task) = dead_letter_task {
        match task.await {
            Ok(count) => tracing::info!(count, "dead-letter log drained"),
            Err(err) => tracing::error!(error = %err, "dead-letter task panicked"),
        }
    }

    Ok(())
}
