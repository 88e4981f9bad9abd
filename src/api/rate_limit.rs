//! Process-wide request budget for the API routes

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::NotKeyed};

use super::{ApiError, ApiState};

/// Liveness checks never count against the budget
const EXEMPT_PATHS: &[&str] = &["/health"];

/// Limiter shared by every request
pub type SharedLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Allow `requests_per_minute` requests, refilled evenly over the minute
#[must_use]
pub fn create_limiter(requests_per_minute: u32) -> SharedLimiter {
    let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))
}

/// Reject requests past the budget with `429 rate_limited`
///
/// Chat and transcription calls each fan out to paid or GPU-bound
/// providers, so the budget is spent per HTTP request, not per sentence.
///
/// # Errors
///
/// Returns [`ApiError::RateLimited`] once the budget is spent
pub async fn rate_limit_middleware(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(limiter) = &state.rate_limiter else {
        return Ok(next.run(req).await);
    };

    let path = req.uri().path();
    if EXEMPT_PATHS.contains(&path) {
        return Ok(next.run(req).await);
    }

    if limiter.check().is_err() {
        tracing::warn!(path = %path, method = %req.method(), "rate limit exceeded");
        return Err(ApiError::RateLimited);
    }

    Ok(next.run(req).await)
}
