//! Retry classification and exponential backoff.

use std::time::Duration;

use rand::Rng;

use crate::ports::{DEFAULT_MAX_ATTEMPTS, ErrorCategory, PublishError};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule another attempt after the delay.
    Retry(Duration),
    /// Stop retrying.
    GiveUp(GiveUpReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    NonRetryable,
    AttemptsExhausted,
}

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts given to new jobs.
    pub max_attempts: u32,
    /// Upper bound for any single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            max_delay,
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self::new(
            std::env::var("PUBLISH_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
            std::env::var("PUBLISH_MAX_BACKOFF_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_delay),
        )
    }

    /// Credentials, permissions and payload rejections will not fix
    /// themselves; everything transient is worth another try.
    pub fn is_retryable(error: &PublishError) -> bool {
        match error.category() {
            ErrorCategory::Auth | ErrorCategory::PermissionDenied | ErrorCategory::Validation => {
                false
            }
            ErrorCategory::RateLimited
            | ErrorCategory::Network
            | ErrorCategory::Upstream
            | ErrorCategory::Timeout => true,
        }
    }

    /// `2^attempt` seconds plus up to one second of jitter, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter: f64 = rand::rng().random();
        self.backoff_with_jitter(attempt, jitter)
    }

    /// Backoff for a fixed jitter fraction in `[0, 1)`.
    pub fn backoff_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let base = Duration::from_secs(1u64 << attempt.min(32));
        let jitter = Duration::from_secs_f64(jitter.clamp(0.0, 0.999_999));
        (base + jitter).min(self.max_delay)
    }

    /// Decide the follow-up for a failed attempt (`attempt` is 1-based).
    pub fn decide(&self, error: &PublishError, attempt: u32, max_attempts: u32) -> RetryDecision {
        if !Self::is_retryable(error) {
            return RetryDecision::GiveUp(GiveUpReason::NonRetryable);
        }
        if attempt >= max_attempts {
            return RetryDecision::GiveUp(GiveUpReason::AttemptsExhausted);
        }

        let mut delay = self.backoff_delay(attempt);
        if let Some(retry_after) = error.retry_after() {
            delay = delay.max(retry_after).min(self.max_delay);
        }
        RetryDecision::Retry(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream() -> PublishError {
        PublishError::Upstream {
            status: 500,
            message: "internal".into(),
        }
    }

    #[test]
    fn test_classification() {
        assert!(!RetryPolicy::is_retryable(&PublishError::Auth("invalid token".into())));
        assert!(!RetryPolicy::is_retryable(&PublishError::PermissionDenied("scope".into())));
        assert!(!RetryPolicy::is_retryable(&PublishError::Validation("bad media".into())));
        assert!(RetryPolicy::is_retryable(&upstream()));
        assert!(RetryPolicy::is_retryable(&PublishError::Network("reset".into())));
        assert!(RetryPolicy::is_retryable(&PublishError::Timeout(Duration::from_secs(30))));
        assert!(RetryPolicy::is_retryable(&PublishError::RateLimited {
            message: "429".into(),
            retry_after: None
        }));
    }

    #[test]
    fn test_backoff_within_bounds() {
        let policy = RetryPolicy::new(5, Duration::from_secs(3600));
        for attempt in 0..10 {
            let floor = Duration::from_secs(1 << attempt);
            for _ in 0..50 {
                let delay = policy.backoff_delay(attempt);
                assert!(delay >= floor, "attempt {attempt}: {delay:?} < {floor:?}");
                assert!(delay < floor + Duration::from_secs(1));
            }
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(5, Duration::from_secs(10));
        assert_eq!(policy.backoff_with_jitter(8, 0.5), Duration::from_secs(10));
        assert_eq!(policy.backoff_with_jitter(1, 0.0), Duration::from_secs(2));
    }

    #[test]
    fn test_non_retryable_gives_up_on_first_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(&PublishError::Auth("401".into()), 1, 5),
            RetryDecision::GiveUp(GiveUpReason::NonRetryable)
        );
    }

    #[test]
    fn test_exhausted_after_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(matches!(policy.decide(&upstream(), 4, 5), RetryDecision::Retry(_)));
        assert_eq!(
            policy.decide(&upstream(), 5, 5),
            RetryDecision::GiveUp(GiveUpReason::AttemptsExhausted)
        );
    }

    #[test]
    fn test_retry_after_extends_delay() {
        let policy = RetryPolicy::new(5, Duration::from_secs(120));
        let error = PublishError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(policy.decide(&error, 1, 5), RetryDecision::Retry(Duration::from_secs(60)));

        let capped = PublishError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(900)),
        };
        assert_eq!(policy.decide(&capped, 1, 5), RetryDecision::Retry(Duration::from_secs(120)));
    }
}
