//! # Middleware Module
//!
//! Rate limiting for the Opptak HTTP API.
//!
//! ## Configuration
//!
//! Rate limiting is configured via environment variable:
//! - `OPPTAK_RATE_LIMIT`: Requests per second (default: 100, 0 disables)

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

/// Default rate limit in requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

const DEFAULT_RPS: NonZeroU32 = match NonZeroU32::new(DEFAULT_RATE_LIMIT) {
    Some(rps) => rps,
    None => NonZeroU32::MIN,
};

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Global rate limiter type alias.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a new global rate limiter. Zero falls back to the default.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_RPS);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Parse a rate limit value, falling back to the default when unset or invalid.
fn parse_rate_limit(value: Option<&str>) -> u32 {
    value
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT)
}

/// Rate limit from `OPPTAK_RATE_LIMIT`.
pub fn get_rate_limit_from_env() -> u32 {
    parse_rate_limit(std::env::var("OPPTAK_RATE_LIMIT").ok().as_deref())
}

/// Rejects requests with 429 once the global limiter is exhausted.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    match limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!("Rate limit exceeded");
            Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_allows_first_request() {
        let limiter = create_rate_limiter(50);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn zero_rate_uses_default_quota() {
        let limiter = create_rate_limiter(0);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn limiter_exhausts_after_burst() {
        let limiter = create_rate_limiter(2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn rate_limit_parsing() {
        assert_eq!(parse_rate_limit(None), DEFAULT_RATE_LIMIT);
        assert_eq!(parse_rate_limit(Some(" 25 ")), 25);
        assert_eq!(parse_rate_limit(Some("0")), 0);
        assert_eq!(parse_rate_limit(Some("fast")), DEFAULT_RATE_LIMIT);
    }
}
