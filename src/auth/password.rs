/// Password Hashing and Verification
///
/// The orchestrator only sees the [`PasswordHasher`] trait; `BcryptHasher` is
/// the production implementation.

use bcrypt::DEFAULT_COST;

use crate::error::{AppError, ConfigError};

/// Cost range accepted by bcrypt
const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// One-way password hashing capability
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AppError>;

    /// `Ok(false)` for a wrong password; `Err` only if the stored hash is unusable
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError>;
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// # Errors
    /// Returns error if `cost` is outside 4..=31
    pub fn check_cost(cost: u32) -> Result<(), ConfigError> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(ConfigError::InvalidValue(format!(
                "password.bcrypt_cost must be between {} and {}, got {}",
                MIN_COST, MAX_COST, cost
            )));
        }
        Ok(())
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, AppError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        bcrypt::verify(password, hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
    }
}
