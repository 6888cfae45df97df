use async_trait::async_trait;
use sqlx::PgPool;

use super::{CredentialStore, NewUser, UserRecord};
use crate::error::DatabaseError;

/// Columns in the order every query selects them
type UserRow = (i64, String, String, String, String, bool);

fn into_record((id, username, email, phone, password_hash, enabled): UserRow) -> UserRecord {
    UserRecord {
        id,
        username,
        email,
        phone,
        password_hash,
        enabled,
    }
}

/// Postgres-backed store
///
/// Uniqueness rests on the `LOWER(email)` and `LOWER(username)` unique
/// indexes created by the migrations; a violation surfaces as
/// `DatabaseError::UniqueConstraintViolation`.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn exists_by_email(&self, email: &str) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, phone, password_hash, enabled, created_at)
            VALUES ($1, $2, $3, $4, TRUE, $5)
            RETURNING id, username, email, phone, password_hash, enabled
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(chrono::Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(into_record(row))
    }

    async fn find_by_principal(&self, principal: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, phone, password_hash, enabled
            FROM users
            WHERE LOWER(email) = LOWER($1) OR LOWER(username) = LOWER($1)
            ORDER BY (LOWER(email) = LOWER($1)) DESC
            LIMIT 1
            "#,
        )
        .bind(principal)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_record))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, phone, password_hash, enabled FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_record))
    }

    async fn set_enabled(&self, id: i64, enabled: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE users SET enabled = $1 WHERE id = $2")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
