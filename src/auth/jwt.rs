/// JWT Token Generation and Validation
///
/// `TokenCodec` signs access and refresh tokens with two independent HMAC
/// keys and verifies them against the key of the expected class. Expiry is
/// checked against the injected [`Clock`] rather than the system time.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::fmt;
use std::sync::Arc;

use crate::auth::claims::{TokenClaims, TokenType};
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{AppError, ConfigError};

const MIN_SECRET_LENGTH: usize = 32;

/// Ten years
const MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Substrings of sample secrets shipped in docs and config templates
const PLACEHOLDER_MARKERS: [&str; 4] = ["your-super-secret", "changeme", "change-me", "placeholder"];

/// Why a token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
    WrongType { expected: TokenType, found: TokenType },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::BadSignature => write!(f, "Invalid token signature"),
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::WrongType { expected, found } => {
                write!(f, "Expected {} token, got {} token", expected, found)
            }
        }
    }
}

impl std::error::Error for TokenError {}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl SigningKey {
    fn from_secret(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }
}

pub struct TokenCodec {
    access: SigningKey,
    refresh: SigningKey,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Build the codec from configuration
    ///
    /// # Errors
    /// Returns a `ConfigError` if either secret is empty, shorter than 32
    /// characters, a known placeholder (unless development secrets are
    /// allowed), or identical to the other; or if a TTL is not between one
    /// second and ten years.
    pub fn new(config: &JwtSettings, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        validate_secret(
            &config.access_secret,
            "jwt.access_secret",
            config.allow_development_secrets,
        )?;
        validate_secret(
            &config.refresh_secret,
            "jwt.refresh_secret",
            config.allow_development_secrets,
        )?;

        if config.access_secret == config.refresh_secret {
            return Err(ConfigError::InvalidValue(
                "jwt.access_secret and jwt.refresh_secret must differ".to_string(),
            ));
        }

        for (name, ttl) in [
            ("jwt.access_token_ttl", config.access_token_ttl),
            ("jwt.refresh_token_ttl", config.refresh_token_ttl),
        ] {
            if ttl <= 0 || ttl > MAX_TTL_SECONDS {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be between 1 and {} seconds, got {}",
                    name, MAX_TTL_SECONDS, ttl
                )));
            }
        }

        tracing::info!(
            access_ttl_secs = config.access_token_ttl,
            refresh_ttl_secs = config.refresh_token_ttl,
            issuer = %config.issuer,
            "Token codec configured"
        );

        Ok(Self {
            access: SigningKey::from_secret(&config.access_secret, config.access_token_ttl),
            refresh: SigningKey::from_secret(&config.refresh_secret, config.refresh_token_ttl),
            issuer: config.issuer.clone(),
            clock,
        })
    }

    fn key(&self, token_type: TokenType) -> &SigningKey {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    /// Lifetime of tokens of the given class, in seconds
    pub fn ttl(&self, token_type: TokenType) -> i64 {
        self.key(token_type).ttl_seconds
    }

    /// Sign a new token of `token_type` for `subject`
    pub fn issue(&self, subject: &str, token_type: TokenType) -> Result<String, AppError> {
        let key = self.key(token_type);
        let claims = TokenClaims::new(
            subject,
            token_type,
            self.clock.now(),
            key.ttl_seconds,
            self.issuer.as_str(),
        );

        encode(&Header::new(Algorithm::HS512), &claims, &key.encoding)
            .map_err(|e| AppError::Internal(format!("{} token generation failed: {}", token_type, e)))
    }

    /// Verify `token` against the key for `expected`
    ///
    /// Checks run in order: structure and signature, expiry, then the `type`
    /// claim. A refresh token presented as an access token therefore fails
    /// with `BadSignature`, since the keys differ.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS512);
        // Expiry is checked against the injected clock below
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<TokenClaims>(token, &self.key(expected).decoding, &validation)?.claims;

        if claims.is_expired_at(self.clock.now()) {
            return Err(TokenError::Expired);
        }

        if claims.token_type != expected {
            return Err(TokenError::WrongType {
                expected,
                found: claims.token_type,
            });
        }

        Ok(claims)
    }

    /// `true` only for a currently valid access token
    pub fn is_valid(&self, token: &str) -> bool {
        self.verify(token, TokenType::Access).is_ok()
    }
}

fn validate_secret(secret: &str, name: &str, allow_development: bool) -> Result<(), ConfigError> {
    if secret.trim().is_empty() {
        return Err(ConfigError::MissingRequired(format!("{} cannot be empty", name)));
    }

    if secret.chars().count() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be at least {} characters long",
            name, MIN_SECRET_LENGTH
        )));
    }

    let lowered = secret.to_lowercase();
    if !allow_development && PLACEHOLDER_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Err(ConfigError::InvalidValue(format!(
            "{} contains a placeholder value - change it in production",
            name
        )));
    }

    Ok(())
}
