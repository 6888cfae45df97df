/// Authentication orchestration
///
/// `AuthService` ties the credential store, the password hasher and the
/// token codec together. Each operation is a self-contained transaction; no
/// state is kept between calls and issued tokens are not recorded.
///
/// Every issued token uses the user's numeric id as its subject.

use std::sync::Arc;

use crate::auth::claims::TokenType;
use crate::auth::jwt::TokenCodec;
use crate::auth::password::PasswordHasher;
use crate::error::{AppError, AuthError, ConfigError, DatabaseError};
use crate::store::{CredentialStore, NewUser, UserRecord};

/// Token pair handed back by register, login and refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub id: i64,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Registration input, already validated at the boundary
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub phone: String,
}

/// Verified against when the principal is unknown, so both login failures
/// pay for one hash verification
const DUMMY_PASSWORD: &str = "Dummy-password-for-timing-1!";

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    codec: TokenCodec,
    dummy_hash: String,
}

impl AuthService {
    /// # Errors
    /// Returns a `ConfigError` if the hasher cannot produce a hash with its
    /// configured parameters.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        codec: TokenCodec,
    ) -> Result<Self, ConfigError> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD).map_err(|e| {
            ConfigError::InvalidValue(format!("password hasher is unusable: {}", e))
        })?;

        Ok(Self {
            store,
            hasher,
            codec,
            dummy_hash,
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create an enabled account and issue its first token pair
    ///
    /// # Errors
    /// - `AuthError::UserAlreadyExists` if the email or username is taken,
    ///   including when a concurrent registration wins the insert
    pub async fn register(&self, registration: Registration) -> Result<AuthTokens, AppError> {
        if self.store.exists_by_email(&registration.email).await? {
            return Err(AuthError::UserAlreadyExists(registration.email).into());
        }

        if self.store.exists_by_username(&registration.username).await? {
            return Err(AuthError::UserAlreadyExists(registration.username).into());
        }

        let password_hash = self.hasher.hash(&registration.password)?;

        let user = self
            .store
            .insert(NewUser {
                username: registration.username,
                email: registration.email.clone(),
                phone: registration.phone,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::UniqueConstraintViolation(_) => {
                    AppError::Auth(AuthError::UserAlreadyExists(registration.email))
                }
                other => AppError::Database(other),
            })?;

        tracing::info!(user_id = user.id, "User registered");

        self.issue_pair(&user)
    }

    /// Authenticate by email or username
    ///
    /// # Errors
    /// - `AuthError::InvalidCredentials` for an unknown principal or a wrong
    ///   password; the two cases are indistinguishable to the caller
    /// - `AuthError::UserDisabled` for a disabled account with a correct password
    pub async fn login(&self, principal: &str, password: &str) -> Result<AuthTokens, AppError> {
        let user = match self.store.find_by_principal(principal).await? {
            Some(user) => user,
            None => {
                // Result ignored; only the cost matters
                let _ = self.hasher.verify(password, &self.dummy_hash);
                tracing::warn!(principal = %principal, "Login failed: user not found");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            tracing::warn!(user_id = user.id, "Login failed: incorrect password");
            return Err(AuthError::InvalidCredentials.into());
        }

        if !user.enabled {
            tracing::warn!(user_id = user.id, "Login rejected: user is disabled");
            return Err(AuthError::UserDisabled.into());
        }

        tracing::info!(user_id = user.id, "User logged in");

        self.issue_pair(&user)
    }

    /// Exchange a refresh token for a new pair
    ///
    /// The presented refresh token stays valid until it expires.
    ///
    /// # Errors
    /// - `AuthError::InvalidRefreshToken` if the token fails verification or
    ///   its subject no longer resolves to a user
    /// - `AuthError::UserDisabled` if the account is disabled
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AppError> {
        let claims = self
            .codec
            .verify(refresh_token, TokenType::Refresh)
            .map_err(|kind| {
                tracing::warn!(reason = %kind, "Refresh token rejected");
                AuthError::InvalidRefreshToken
            })?;

        let user_id: i64 = claims.sub.parse().map_err(|_| {
            tracing::warn!(subject = %claims.sub, "Refresh token subject is not a user id");
            AuthError::InvalidRefreshToken
        })?;

        let user = self.store.find_by_id(user_id).await?.ok_or_else(|| {
            tracing::warn!(user_id = user_id, "Refresh token subject not found");
            AuthError::InvalidRefreshToken
        })?;

        if !user.enabled {
            tracing::warn!(user_id = user.id, "Disabled user attempted to refresh token");
            return Err(AuthError::UserDisabled.into());
        }

        tracing::info!(user_id = user.id, "Token refreshed");

        self.issue_pair(&user)
    }

    /// `true` only for a currently valid access token
    ///
    /// Accepts a raw token or an `Authorization` header value with a
    /// `Bearer ` prefix. Never fails; the rejection reason is logged.
    pub fn validate_token(&self, authorization: &str) -> bool {
        let token = strip_bearer(authorization);
        if token.is_empty() {
            return false;
        }

        match self.codec.verify(token, TokenType::Access) {
            Ok(_) => true,
            Err(kind) => {
                tracing::debug!(reason = %kind, "Access token rejected");
                false
            }
        }
    }

    fn issue_pair(&self, user: &UserRecord) -> Result<AuthTokens, AppError> {
        let subject = user.id.to_string();

        Ok(AuthTokens {
            id: user.id,
            access_token: self.codec.issue(&subject, TokenType::Access)?,
            refresh_token: self.codec.issue(&subject, TokenType::Refresh)?,
            expires_in: self.codec.ttl(TokenType::Access),
        })
    }
}

/// Strip a case-insensitive `Bearer ` scheme, if present
fn strip_bearer(header: &str) -> &str {
    let trimmed = header.trim();
    match trimmed.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim(),
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::BcryptHasher;
    use crate::clock::MockClock;
    use crate::configuration::JwtSettings;
    use crate::store::InMemoryCredentialStore;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Bcrypt at minimum cost, counting verifications
    #[derive(Default)]
    struct CountingHasher {
        verifies: AtomicUsize,
    }

    impl PasswordHasher for CountingHasher {
        fn hash(&self, password: &str) -> Result<String, AppError> {
            BcryptHasher::new(4).hash(password)
        }

        fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
            self.verifies.fetch_add(1, Ordering::SeqCst);
            BcryptHasher::new(4).verify(password, hash)
        }
    }

    struct Harness {
        service: Arc<AuthService>,
        store: Arc<InMemoryCredentialStore>,
        clock: Arc<MockClock>,
    }

    fn harness() -> Harness {
        harness_with(Arc::new(BcryptHasher::new(4)))
    }

    fn harness_with(hasher: Arc<dyn PasswordHasher>) -> Harness {
        let clock = Arc::new(MockClock::starting_now());
        let store = Arc::new(InMemoryCredentialStore::new());
        let config = JwtSettings {
            access_secret: "access-secret-key-at-least-32-characters-long".to_string(),
            refresh_secret: "refresh-secret-key-at-least-32-characters-long".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 604800,
            issuer: "test".to_string(),
            allow_development_secrets: false,
        };
        let codec = TokenCodec::new(&config, clock.clone()).unwrap();
        let service = AuthService::new(store.clone(), hasher, codec).unwrap();

        Harness {
            service: Arc::new(service),
            store,
            clock,
        }
    }

    fn registration(username: &str, email: &str) -> Registration {
        Registration {
            username: username.to_string(),
            password: "Password123!".to_string(),
            email: email.to_string(),
            phone: "+12345678901".to_string(),
        }
    }

    fn auth_error(result: Result<AuthTokens, AppError>) -> AuthError {
        match result {
            Err(AppError::Auth(e)) => e,
            other => panic!("expected auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_issues_pair_bound_to_user_id() {
        let h = harness();
        let tokens = h
            .service
            .register(registration("alice", "alice@example.com"))
            .await
            .expect("registration should succeed");

        assert_eq!(tokens.expires_in, 900);
        let claims = h.service.codec().verify(&tokens.access_token, TokenType::Access).unwrap();
        assert_eq!(claims.sub, tokens.id.to_string());
        let claims = h.service.codec().verify(&tokens.refresh_token, TokenType::Refresh).unwrap();
        assert_eq!(claims.sub, tokens.id.to_string());

        let stored = h.store.find_by_id(tokens.id).await.unwrap().unwrap();
        assert!(stored.enabled);
        assert_ne!(stored.password_hash, "Password123!");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email_and_username() {
        let h = harness();
        h.service.register(registration("alice", "alice@example.com")).await.unwrap();

        let dup_email = h.service.register(registration("other", "alice@example.com")).await;
        assert_eq!(
            auth_error(dup_email),
            AuthError::UserAlreadyExists("alice@example.com".to_string())
        );

        let dup_username = h.service.register(registration("alice", "new@example.com")).await;
        assert_eq!(auth_error(dup_username), AuthError::UserAlreadyExists("alice".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_registrations_admit_one() {
        let h = harness();
        let mut handles = Vec::new();
        for i in 0..8 {
            let service = h.service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .register(registration(&format!("racer{}", i), "racer@example.com"))
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::Auth(AuthError::UserAlreadyExists(_))) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_login_by_email_or_username_ignoring_case() {
        let h = harness();
        let registered = h.service.register(registration("alice", "alice@example.com")).await.unwrap();

        for principal in ["alice@example.com", "ALICE@Example.com", "alice", "Alice"] {
            let tokens = h.service.login(principal, "Password123!").await.unwrap();
            assert_eq!(tokens.id, registered.id);
            assert!(h.service.validate_token(&tokens.access_token));
        }
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let h = harness();
        h.service.register(registration("alice", "alice@example.com")).await.unwrap();

        let unknown = h.service.login("nonexistent@x.com", "Password123!").await.unwrap_err();
        let wrong_password = h.service.login("alice@example.com", "WrongPass1!").await.unwrap_err();

        assert_eq!(unknown.error_code(), wrong_password.error_code());
        assert_eq!(unknown.to_string(), wrong_password.to_string());
        assert_eq!(unknown.error_code(), "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn test_unknown_principal_still_verifies_a_hash() {
        let hasher = Arc::new(CountingHasher::default());
        let h = harness_with(hasher.clone());
        h.service.register(registration("alice", "alice@example.com")).await.unwrap();
        let before = hasher.verifies.load(Ordering::SeqCst);

        let unknown = h.service.login("nobody@example.com", "Password123!").await;
        assert_eq!(auth_error(unknown), AuthError::InvalidCredentials);
        assert_eq!(hasher.verifies.load(Ordering::SeqCst), before + 1);

        let wrong_password = h.service.login("alice", "WrongPass1!").await;
        assert_eq!(auth_error(wrong_password), AuthError::InvalidCredentials);
        assert_eq!(hasher.verifies.load(Ordering::SeqCst), before + 2);
    }

    #[test]
    fn test_unusable_hasher_is_config_error() {
        let clock = Arc::new(MockClock::starting_now());
        let config = JwtSettings {
            access_secret: "access-secret-key-at-least-32-characters-long".to_string(),
            refresh_secret: "refresh-secret-key-at-least-32-characters-long".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 604800,
            issuer: "test".to_string(),
            allow_development_secrets: false,
        };
        let codec = TokenCodec::new(&config, clock).unwrap();

        // bcrypt rejects costs below 4
        let result = AuthService::new(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(BcryptHasher::new(3)),
            codec,
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[tokio::test]
    async fn test_disabled_user_cannot_login_or_refresh() {
        let h = harness();
        let tokens = h.service.register(registration("alice", "alice@example.com")).await.unwrap();
        h.store.set_enabled(tokens.id, false).await.unwrap();

        let login = h.service.login("alice", "Password123!").await;
        assert_eq!(auth_error(login), AuthError::UserDisabled);

        let refresh = h.service.refresh(&tokens.refresh_token).await;
        assert_eq!(auth_error(refresh), AuthError::UserDisabled);

        // Wrong password still reports invalid credentials
        let login = h.service.login("alice", "WrongPass1!").await;
        assert_eq!(auth_error(login), AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_refresh_issues_new_pair_and_keeps_old_token_valid() {
        let h = harness();
        let first = h.service.register(registration("alice", "alice@example.com")).await.unwrap();

        h.clock.advance(Duration::seconds(5));
        let second = h.service.refresh(&first.refresh_token).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_ne!(second.access_token, first.access_token);
        // No revocation
        assert!(h.service.refresh(&first.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rejects_bad_tokens_uniformly() {
        let h = harness();
        let tokens = h.service.register(registration("alice", "alice@example.com")).await.unwrap();
        let unknown_subject = h.service.codec().issue("999", TokenType::Refresh).unwrap();
        let non_numeric_subject = h.service.codec().issue("alice@example.com", TokenType::Refresh).unwrap();

        for bad in [
            "garbage",
            tokens.access_token.as_str(),
            unknown_subject.as_str(),
            non_numeric_subject.as_str(),
        ] {
            let result = h.service.refresh(bad).await;
            assert_eq!(auth_error(result), AuthError::InvalidRefreshToken, "token: {}", bad);
        }
    }

    #[tokio::test]
    async fn test_refresh_token_expires() {
        let h = harness();
        let tokens = h.service.register(registration("alice", "alice@example.com")).await.unwrap();

        h.clock.advance(Duration::seconds(604800));
        let result = h.service.refresh(&tokens.refresh_token).await;
        assert_eq!(auth_error(result), AuthError::InvalidRefreshToken);
    }

    #[tokio::test]
    async fn test_validate_token_collapses_failures_to_false() {
        let h = harness();
        let tokens = h.service.register(registration("alice", "alice@example.com")).await.unwrap();

        assert!(h.service.validate_token(&tokens.access_token));
        assert!(h.service.validate_token(&format!("Bearer {}", tokens.access_token)));
        assert!(h.service.validate_token(&format!("bearer  {} ", tokens.access_token)));

        assert!(!h.service.validate_token(""));
        assert!(!h.service.validate_token("Bearer "));
        assert!(!h.service.validate_token("Bearer not.a.token"));
        assert!(!h.service.validate_token(&tokens.refresh_token));

        h.clock.advance(Duration::seconds(900));
        assert!(!h.service.validate_token(&tokens.access_token));
    }

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc"), "abc");
        assert_eq!(strip_bearer("BEARER abc"), "abc");
        assert_eq!(strip_bearer("abc"), "abc");
        assert_eq!(strip_bearer("  Bearer   abc  "), "abc");
        assert_eq!(strip_bearer("Bearé"), "Bearé");
    }
}
