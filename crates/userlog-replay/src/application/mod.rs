//! Application services: event log, publishing, consumption and replay.

pub mod consumer;
pub mod event_log_service;
pub mod publisher;
pub mod replay_engine;
pub mod user_service;
