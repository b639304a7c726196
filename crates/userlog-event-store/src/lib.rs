//! PostgreSQL implementations of the Userlog store traits.

pub mod pg_event_repository;
pub mod pg_user_repository;
pub mod schema;

pub use pg_event_repository::PgEventRepository;
pub use pg_user_repository::PgUserRepository;

/// Maps a driver failure onto the domain storage error.
pub(crate) fn storage_error(err: sqlx::Error) -> userlog_core::error::DomainError {
    userlog_core::error::DomainError::Storage(err.to_string())
}
