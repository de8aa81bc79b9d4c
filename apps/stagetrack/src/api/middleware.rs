//! # Middleware Module
//!
//! Rate limiting for the Stagetrack view server.
//!
//! ## Configuration
//!
//! Rate limiting is configured via environment variable:
//! - `STAGETRACK_RATE_LIMIT`: Requests per second (default: 50, 0 disables)

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Requests per second when nothing is configured.
pub const DEFAULT_RATE_LIMIT: u32 = 50;

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Global rate limiter type alias.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a new global rate limiter.
///
/// A zero rate falls back to [`DEFAULT_RATE_LIMIT`].
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second)
        .or(NonZeroU32::new(DEFAULT_RATE_LIMIT))
        .unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Get rate limit from environment variable.
///
/// Returns the value of `STAGETRACK_RATE_LIMIT`, or [`DEFAULT_RATE_LIMIT`]
/// when unset or unparsable.
pub fn get_rate_limit_from_env() -> u32 {
    std::env::var("STAGETRACK_RATE_LIMIT")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT)
}

/// Rate limiting middleware. Returns 429 once the quota is spent.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    match limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(event = "rate_limited", "Rate limit exceeded");
            Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
