/// Request throttling for the authentication routes
///
/// One token bucket per protected route, shared by every caller of that
/// route. Buckets start full and refill greedily: `capacity` tokens accrue
/// evenly over each `period`, never exceeding `capacity`.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::clock::Clock;
use crate::configuration::{BucketSettings, RateLimitSettings};
use crate::error::{AppError, ConfigError};

/// Protected routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Refresh,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Login => "login",
            Route::Register => "register",
            Route::Refresh => "refresh",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a consumption attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Consumption {
    pub consumed: bool,
    /// Whole tokens left after this attempt
    pub remaining: u32,
    /// Zero when consumed; otherwise the wait until `n` tokens are available
    pub retry_after: Duration,
}

/// Token counts are kept in units of `1 / period_nanos` of a token so that
/// refill arithmetic is exact.
#[derive(Debug)]
struct BucketState {
    available: u128,
    last_refill: DateTime<Utc>,
}

/// Fixed-capacity, continuously refilling counter
pub struct TokenBucket {
    capacity: u32,
    period: Duration,
    state: Mutex<BucketState>,
    clock: Arc<dyn Clock>,
}

impl TokenBucket {
    /// A full bucket that refills `capacity` tokens per `period`
    ///
    /// # Errors
    /// Returns error if `capacity` or `period` is zero
    pub fn new(capacity: u32, period: Duration, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "rate limit requests must be at least 1".to_string(),
            ));
        }
        if period.is_zero() {
            return Err(ConfigError::InvalidValue(
                "rate limit period must be positive".to_string(),
            ));
        }

        let now = clock.now();
        Ok(Self {
            capacity,
            period,
            state: Mutex::new(BucketState {
                available: capacity as u128 * period.as_nanos(),
                last_refill: now,
            }),
            clock,
        })
    }

    fn from_settings(settings: &BucketSettings, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        Self::new(settings.requests, Duration::from_secs(settings.period_secs), clock)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    fn unit(&self) -> u128 {
        self.period.as_nanos()
    }

    /// Take `n` tokens if available
    pub fn try_consume(&self, n: u32) -> bool {
        self.try_consume_and_return_remaining(n).consumed
    }

    /// Take `n` tokens if available and report what is left
    ///
    /// Refill and consumption happen under one lock, so concurrent callers can
    /// never take more than the bucket holds.
    pub fn try_consume_and_return_remaining(&self, n: u32) -> Consumption {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state, now);

        let wanted = n as u128 * self.unit();
        if state.available >= wanted {
            state.available -= wanted;
            return Consumption {
                consumed: true,
                remaining: (state.available / self.unit()) as u32,
                retry_after: Duration::ZERO,
            };
        }

        let retry_after = if n > self.capacity {
            // Can never be satisfied; report a full period
            self.period
        } else {
            // Each elapsed nanosecond adds `capacity` units
            let deficit = wanted - state.available;
            let nanos = (deficit + self.capacity as u128 - 1) / self.capacity as u128;
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        };

        Consumption {
            consumed: false,
            remaining: (state.available / self.unit()) as u32,
            retry_after,
        }
    }

    /// Whole tokens currently available
    pub fn available(&self) -> u32 {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state, now);
        (state.available / self.unit()) as u32
    }

    fn refill(&self, state: &mut BucketState, now: DateTime<Utc>) {
        // A clock that moved backwards adds nothing and keeps the old mark
        let elapsed = match (now - state.last_refill).to_std() {
            Ok(elapsed) => elapsed,
            Err(_) => return,
        };

        let full = self.capacity as u128 * self.unit();
        let added = elapsed.as_nanos().saturating_mul(self.capacity as u128);
        state.available = state.available.saturating_add(added).min(full);
        state.last_refill = now;
    }
}

/// Per-route buckets for login, register and refresh
///
/// Buckets are not keyed by client: every caller of a route draws from the
/// same budget.
pub struct RateLimiter {
    login: TokenBucket,
    register: TokenBucket,
    refresh: TokenBucket,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let limiter = Self {
            login: TokenBucket::from_settings(&settings.login, clock.clone())?,
            register: TokenBucket::from_settings(&settings.register, clock.clone())?,
            refresh: TokenBucket::from_settings(&settings.refresh, clock)?,
        };

        for (route, bucket) in [
            (Route::Login, &settings.login),
            (Route::Register, &settings.register),
            (Route::Refresh, &settings.refresh),
        ] {
            tracing::info!(
                route = %route,
                requests = bucket.requests,
                period_secs = bucket.period_secs,
                "Rate limit configured"
            );
        }

        Ok(limiter)
    }

    pub fn bucket(&self, route: Route) -> &TokenBucket {
        match route {
            Route::Login => &self.login,
            Route::Register => &self.register,
            Route::Refresh => &self.refresh,
        }
    }

    pub fn try_consume(&self, route: Route, n: u32) -> bool {
        self.bucket(route).try_consume(n)
    }

    /// Consume one token for `route` or fail with `AppError::RateLimited`
    pub fn check(&self, route: Route) -> Result<(), AppError> {
        let outcome = self.bucket(route).try_consume_and_return_remaining(1);
        if outcome.consumed {
            tracing::debug!(route = %route, remaining = outcome.remaining, "Rate limit token consumed");
            return Ok(());
        }

        let retry_after_secs = outcome.retry_after.as_secs_f64().ceil().max(1.0) as u64;
        Err(AppError::RateLimited { retry_after_secs })
    }
}
