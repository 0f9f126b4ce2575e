//! Rate limiting port.

use std::time::Duration;

use async_trait::async_trait;

/// Rate limiter trait - caps how often a keyed action may run.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Try to take one permit for `key` without waiting.
    async fn check(&self, key: &str) -> Result<RateLimitResult, RateLimitError>;

    /// Wait until a permit for `key` is available and take it.
    async fn acquire(&self, key: &str) -> Result<(), RateLimitError>;
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_after: Duration,
}

/// Rate limit errors.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),
}
