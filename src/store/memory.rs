use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CredentialStore, NewUser, UserRecord};
use crate::error::DatabaseError;

#[derive(Debug, Default)]
struct Users {
    next_id: i64,
    rows: Vec<UserRecord>,
}

/// Process-local store
///
/// Uniqueness checks and inserts happen under one lock, so concurrent
/// registrations cannot admit duplicates.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<Users>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> MutexGuard<'_, Users> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn exists_by_email(&self, email: &str) -> Result<bool, DatabaseError> {
        Ok(self.users().rows.iter().any(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, DatabaseError> {
        Ok(self
            .users()
            .rows
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(username)))
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, DatabaseError> {
        let mut users = self.users();

        if users.rows.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(DatabaseError::UniqueConstraintViolation("users.email".to_string()));
        }
        if users
            .rows
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(&user.username))
        {
            return Err(DatabaseError::UniqueConstraintViolation("users.username".to_string()));
        }

        users.next_id += 1;
        let record = UserRecord {
            id: users.next_id,
            username: user.username,
            email: user.email,
            phone: user.phone,
            password_hash: user.password_hash,
            enabled: true,
        };
        users.rows.push(record.clone());

        Ok(record)
    }

    async fn find_by_principal(&self, principal: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let users = self.users();
        let by_email = users.rows.iter().find(|u| u.email.eq_ignore_ascii_case(principal));
        let found = by_email.or_else(|| {
            users
                .rows
                .iter()
                .find(|u| u.username.eq_ignore_ascii_case(principal))
        });

        Ok(found.cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, DatabaseError> {
        Ok(self.users().rows.iter().find(|u| u.id == id).cloned())
    }

    async fn set_enabled(&self, id: i64, enabled: bool) -> Result<bool, DatabaseError> {
        let mut users = self.users();
        match users.rows.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.enabled = enabled;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
