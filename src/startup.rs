use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthService, BcryptHasher, PasswordHasher, TokenCodec};
use crate::clock::Clock;
use crate::configuration::Settings;
use crate::error::{AppError, ConfigError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::rate_limit::RateLimiter;
use crate::routes::{health_check, login, refresh, register, validate};
use crate::store::CredentialStore;

/// Shared state handed to every worker
pub struct AppState {
    pub auth: AuthService,
    pub limiter: RateLimiter,
}

impl AppState {
    /// Wire the codec, service and limiter from configuration
    ///
    /// # Errors
    /// Fails on unusable JWT secrets or TTLs, a bcrypt cost outside 4..=31,
    /// or a zero rate limit.
    pub fn build(
        settings: &Settings,
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        BcryptHasher::check_cost(settings.password.bcrypt_cost)?;
        let codec = TokenCodec::new(&settings.jwt, clock.clone())?;
        let limiter = RateLimiter::new(&settings.rate_limit, clock)?;

        Ok(Self {
            auth: AuthService::new(store, hasher, codec)?,
            limiter,
        })
    }
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let state = web::Data::new(state);

    // Malformed or incomplete bodies render as 400 INVALID_INPUT
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        tracing::warn!(error = %err, "Request body rejected");
        AppError::Validation(ValidationError::InvalidFormat(format!(
            "Invalid request body: {}",
            err
        )))
        .into()
    });

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())      // Standard logging
            .wrap(LoggerMiddleware)       // Client address and latency

            // Shared state
            .app_data(state.clone())
            .app_data(json_config.clone())

            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/validate", web::post().to(validate))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
