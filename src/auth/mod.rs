/// Authentication module
///
/// Handles token issuing/verification, password hashing,
/// and the register/login/refresh/validate flows built on them.

mod claims;
mod jwt;
mod password;
mod service;

pub use claims::{TokenClaims, TokenType};
pub use jwt::{TokenCodec, TokenError};
pub use password::{BcryptHasher, PasswordHasher};
pub use service::{AuthService, AuthTokens, Registration};
