/// JWT Claims structure
///
/// The payload carried by both access and refresh tokens. The `type` claim
/// records which key class signed the token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token class; each class has its own signing key and TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject (user id)
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
}

impl TokenClaims {
    pub fn new(
        subject: impl Into<String>,
        token_type: TokenType,
        issued_at: DateTime<Utc>,
        ttl_seconds: i64,
        issuer: impl Into<String>,
    ) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: subject.into(),
            token_type,
            iat,
            exp: iat.saturating_add(ttl_seconds),
            iss: issuer.into(),
        }
    }

    /// Expired once `now` reaches `exp`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}
