//! Database schema management.

use sqlx::PgPool;
use sqlx::migrate::MigrateError;

/// Applies the embedded migrations in `migrations/` to the given pool.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the recorded history does
/// not match the embedded files.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}
