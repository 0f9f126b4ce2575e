//! In-memory rate limiter using governor crate.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};

use herald_core::ports::{RateLimitError, RateLimitResult, RateLimiter};

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Dispatch budget: at most `max_requests` platform calls per `window`.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self {
            max_requests: std::env::var("PUBLISH_RATE_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            window: Duration::from_secs(
                std::env::var("PUBLISH_RATE_WINDOW_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}

/// Process-wide GCRA limiter shared by every worker.
///
/// Keys are ignored: all dispatches draw from one budget.
pub struct InMemoryRateLimiter {
    limiter: DirectRateLimiter,
    clock: DefaultClock,
    config: RateLimitConfig,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        let burst = NonZeroU32::new(config.max_requests)
            .ok_or_else(|| RateLimitError::Config("max_requests must be non-zero".into()))?;
        if config.window.is_zero() {
            return Err(RateLimitError::Config("window must be non-zero".into()));
        }
        let quota = Quota::with_period(config.window / config.max_requests)
            .ok_or_else(|| {
                RateLimitError::Config(format!(
                    "rate too high for the window: {} requests per {:?} leaves no time between permits",
                    config.max_requests, config.window
                ))
            })?
            .allow_burst(burst);

        tracing::info!(
            max_requests = config.max_requests,
            window_secs = config.window.as_secs(),
            "Dispatch rate limiter configured"
        );

        Ok(Self {
            limiter: DirectRateLimiter::direct(quota),
            clock: DefaultClock::default(),
            config,
        })
    }

    pub fn from_env() -> Result<Self, RateLimitError> {
        Self::new(RateLimitConfig::from_env())
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, _key: &str) -> Result<RateLimitResult, RateLimitError> {
        match self.limiter.check() {
            Ok(_) => Ok(RateLimitResult {
                allowed: true,
                remaining: self.config.max_requests, // Approximate
                reset_after: Duration::ZERO,
            }),
            Err(not_until) => Ok(RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_after: not_until.wait_time_from(self.clock.now()),
            }),
        }
    }

    async fn acquire(&self, _key: &str) -> Result<(), RateLimitError> {
        self.limiter.until_ready().await;
        Ok(())
    }
}
