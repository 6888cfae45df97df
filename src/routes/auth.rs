/// Authentication Routes
///
/// Registration, login, token refresh and access token validation.
/// Every throttled route draws one token from its bucket before any input
/// validation or credential work happens.

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthTokens, Registration};
use crate::error::{AppError, ErrorContext};
use crate::logger::client_ip;
use crate::rate_limit::Route;
use crate::startup::AppState;
use crate::validators::{
    is_present, is_valid_email, is_valid_password, is_valid_phone, is_valid_principal,
    is_valid_username,
};

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub phone: String,
}

/// User login request; `principal` is an email or a username
#[derive(Deserialize)]
pub struct LoginRequest {
    pub principal: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub id: i64,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<AuthTokens> for TokenResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            id: tokens.id,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.expires_in,
        }
    }
}

fn throttle(
    state: &AppState,
    route: Route,
    req: &HttpRequest,
    context: &ErrorContext,
) -> Result<(), AppError> {
    state.limiter.check(route).map_err(|e| {
        tracing::warn!(
            request_id = %context.request_id,
            route = %route,
            client_ip = %client_ip(req.headers(), req.peer_addr()),
            "Rate limit exceeded"
        );
        e
    })
}

/// POST /auth/register
///
/// # Validation
/// - Username: 3-20 letters, digits or underscores
/// - Email: valid format, 5-254 characters
/// - Phone: 11 digits, optional leading `+`
/// - Password: 8-100 characters with lower, upper, digit and one of `@$!%*?&`
///
/// # Errors
/// - 400: Validation errors
/// - 409: Email or username already registered
/// - 429: Registration rate limit exhausted
pub async fn register(
    req: HttpRequest,
    form: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    let tokens = context.observe(register_user(&req, form.into_inner(), &state, &context).await)?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = tokens.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Ok().json(TokenResponse::from(tokens)))
}

async fn register_user(
    req: &HttpRequest,
    form: RegisterRequest,
    state: &AppState,
    context: &ErrorContext,
) -> Result<AuthTokens, AppError> {
    throttle(state, Route::Register, req, context)?;

    let registration = Registration {
        username: is_valid_username(&form.username)?,
        email: is_valid_email(&form.email)?,
        phone: is_valid_phone(&form.phone)?,
        password: {
            is_valid_password(&form.password)?;
            form.password
        },
    };

    state.auth.register(registration).await
}

/// POST /auth/login
///
/// # Errors
/// - 400: Blank principal or password
/// - 401: Unknown principal or wrong password (same response for both)
/// - 403: Account is disabled
/// - 429: Login rate limit exhausted
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");
    let tokens = context.observe(login_user(&req, &form, &state, &context).await)?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = tokens.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(TokenResponse::from(tokens)))
}

async fn login_user(
    req: &HttpRequest,
    form: &LoginRequest,
    state: &AppState,
    context: &ErrorContext,
) -> Result<AuthTokens, AppError> {
    throttle(state, Route::Login, req, context)?;

    let principal = is_valid_principal(&form.principal)?;
    is_present(&form.password, "password")?;

    state.auth.login(&principal, &form.password).await
}

/// POST /auth/refresh
///
/// Issues a new pair. The presented refresh token is not revoked.
///
/// # Errors
/// - 400: Blank refresh token
/// - 401: Invalid, expired or wrong-type token, or unknown subject
/// - 403: Account is disabled
/// - 429: Refresh rate limit exhausted
pub async fn refresh(
    req: HttpRequest,
    form: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");
    let tokens = context.observe(refresh_tokens(&req, &form, &state, &context).await)?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = tokens.id,
        "Token refreshed successfully"
    );

    Ok(HttpResponse::Ok().json(TokenResponse::from(tokens)))
}

async fn refresh_tokens(
    req: &HttpRequest,
    form: &RefreshRequest,
    state: &AppState,
    context: &ErrorContext,
) -> Result<AuthTokens, AppError> {
    throttle(state, Route::Refresh, req, context)?;

    is_present(&form.refresh_token, "refreshToken")?;

    state.auth.refresh(form.refresh_token.trim()).await
}

/// POST /auth/validate
///
/// Reads `Authorization: Bearer <token>` and answers `true` or `false`.
/// Not throttled and never fails.
pub async fn validate(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let valid = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| state.auth.validate_token(value))
        .unwrap_or(false);

    tracing::debug!(valid = valid, "Token validation requested");

    HttpResponse::Ok().json(valid)
}
