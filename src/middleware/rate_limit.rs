//! Rate limiting middleware
//!
//! Per-IP limits for the unauthenticated auth endpoints (login, signup and
//! the reset flow), using governor's keyed rate limiter.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};
use tracing::{debug, warn};

use crate::config::RateLimitSettings;
use crate::utils::error::ErrorResponse;

/// Shared keyed limiter, cheap to clone into the middleware state
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    retry_after_secs: u64,
}

impl RateLimitState {
    /// `requests_per_period` requests per `period_secs`, with `burst_size` allowed at once
    pub fn new(settings: &RateLimitSettings) -> Self {
        let requests = NonZeroU32::new(settings.requests_per_period).unwrap_or(NonZeroU32::MIN);
        let period = Duration::from_secs(settings.period_secs.max(1));
        let replenish = period / requests.get();

        let quota = Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_second(requests))
            .allow_burst(NonZeroU32::new(settings.burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            retry_after_secs: replenish.as_secs().max(1),
        }
    }

    pub fn check(&self, ip: IpAddr) -> bool {
        self.limiter.check_key(&ip).is_ok()
    }

    /// Drop state for clients whose quota has fully replenished
    pub fn cleanup(&self) {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!(before, after = self.limiter.len(), "Rate limiter cleanup");
    }
}

/// Rate limiting middleware for Axum
///
/// Requests without a peer address (in-process tests) pass through.
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match ip {
        Some(ip) if !rate_limit.check(ip) => {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            RateLimitExceeded {
                retry_after_secs: rate_limit.retry_after_secs,
            }
            .into_response()
        }
        _ => next.run(request).await,
    }
}

/// Rate limit exceeded response
pub struct RateLimitExceeded {
    pub retry_after_secs: u64,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            [(RETRY_AFTER, self.retry_after_secs.to_string())],
            Json(ErrorResponse::new(
                "rate_limited",
                "Too many requests. Please try again later.",
            )),
        )
            .into_response()
    }
}

/// Spawn a background task to periodically clean up limiter state
pub fn spawn_rate_limit_cleanup(state: RateLimitState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            state.cleanup();
        }
    });
}
