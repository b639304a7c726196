//! Shared test doubles and utilities for the Userlog replay engine.

mod broker;
mod clock;
mod handler;
mod repository;

pub use broker::{FailingPublisher, RecordingPublisher};
pub use clock::FixedClock;
pub use handler::RecordingEventHandler;
pub use repository::{
    FailingEventRepository, FailingUserRepository, FlakyUserRepository, InMemoryEventRepository,
    InMemoryUserRepository,
};
