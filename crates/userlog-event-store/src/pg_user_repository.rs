//! `PostgreSQL` implementation of the `UserRepository` trait.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, PgPool};
use tracing::debug;

use userlog_core::error::DomainError;
use userlog_core::repository::UserRepository;
use userlog_core::user::{NewUser, UserRecord};

use crate::storage_error;

/// A row of the `users` table.
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    created_at: NaiveDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL-backed user state store.
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Creates a new `PgUserRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, DomainError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DomainError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, created_at FROM users WHERE username = $1 \
             ORDER BY id ASC LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, DomainError> {
        let Some(id) = user.id else {
            let row = sqlx::query_as::<_, UserRow>(
                "INSERT INTO users (username, email, created_at) VALUES ($1, $2, $3) \
                 RETURNING id, username, email, created_at",
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
            return Ok(row.into());
        };

        // Replayed rows keep their original id; the identity sequence must
        // then move past it so later generated ids do not collide.
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, username, email, created_at) VALUES ($1, $2, $3, $4) \
             RETURNING id, username, email, created_at",
        )
        .bind(id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;
        sqlx::query(
            "SELECT setval(pg_get_serial_sequence('users', 'id'), \
             GREATEST((SELECT MAX(id) FROM users), 1))",
        )
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;
        tx.commit().await.map_err(storage_error)?;

        debug!(user_id = id, "user inserted with preserved id");
        Ok(row.into())
    }

    async fn update(&self, user: &UserRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE users SET username = $2, email = $3, created_at = $4 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(result.rows_affected())
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, DomainError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, created_at FROM users ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }
}
