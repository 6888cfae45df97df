mod auth;
mod health_check;

pub use auth::{login, refresh, register, validate, LoginRequest, RefreshRequest, RegisterRequest, TokenResponse};
pub use health_check::health_check;
