/// Credential storage
///
/// `CredentialStore` is the persistence seam used by the auth service. The
/// store owns the uniqueness guarantee for username and email: `insert` must
/// be an atomic check-and-insert, because the service's own `exists_by_*`
/// checks followed by `insert` can race.

mod memory;
mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;

use crate::error::DatabaseError;

/// A persisted user account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub enabled: bool,
}

/// Account data for registration; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive
    async fn exists_by_email(&self, email: &str) -> Result<bool, DatabaseError>;

    /// Case-insensitive
    async fn exists_by_username(&self, username: &str) -> Result<bool, DatabaseError>;

    /// Persist a new enabled user
    ///
    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` if the email or username is
    /// already taken, compared case-insensitively.
    async fn insert(&self, user: NewUser) -> Result<UserRecord, DatabaseError>;

    /// Find the user whose email or username equals `principal`, ignoring case.
    /// An email match wins over a username match.
    async fn find_by_principal(&self, principal: &str) -> Result<Option<UserRecord>, DatabaseError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, DatabaseError>;

    /// Returns `false` if no user has this id
    async fn set_enabled(&self, id: i64, enabled: bool) -> Result<bool, DatabaseError>;
}
