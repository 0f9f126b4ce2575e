//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use herald_core::publishing::RetryPolicy;
use herald_infra::WorkerPoolConfig;
use herald_infra::notify::WebhookNotifierConfig;
use herald_infra::platforms::InstagramAdapter;

#[cfg(feature = "postgres")]
use herald_infra::DatabaseConfig;

/// Configuration rejected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where publish jobs are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    Memory,
    Redis,
}

impl QueueBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueBackend::Memory => "memory",
            QueueBackend::Redis => "redis",
        }
    }
}

impl std::str::FromStr for QueueBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(QueueBackend::Memory),
            "redis" => Ok(QueueBackend::Redis),
            other => Err(ConfigError::Invalid {
                name: "QUEUE_BACKEND",
                reason: format!("expected `memory` or `redis`, got `{other}`"),
            }),
        }
    }
}

/// Worker pool, retry and throttle settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: WorkerPoolConfig,
    /// How long a claim stays exclusive.
    pub lease_duration: Duration,
    pub retry: RetryPolicy,
    /// Upper bound on a single platform call.
    pub adapter_timeout: Duration,
    /// Upper bound on a call to a video platform (YouTube, Instagram).
    pub media_timeout: Duration,
    /// Largest media file an adapter downloads.
    pub max_media_bytes: u64,
    /// Dispatches allowed per `rate_window`.
    pub rate_limit: u32,
    pub rate_window: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: WorkerPoolConfig::default(),
            lease_duration: Duration::from_secs(120),
            retry: RetryPolicy::default(),
            adapter_timeout: Duration::from_secs(30),
            media_timeout: Duration::from_secs(90),
            max_media_bytes: 512 * 1024 * 1024,
            rate_limit: 60,
            rate_window: Duration::from_secs(60),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            workers: WorkerPoolConfig::from_env(),
            lease_duration: Duration::from_secs(env_or("PUBLISH_LEASE_SECS", 120)),
            retry: RetryPolicy::from_env(),
            adapter_timeout: Duration::from_secs(env_or("PUBLISH_ADAPTER_TIMEOUT_SECS", 30)),
            media_timeout: Duration::from_secs(env_or("PUBLISH_MEDIA_TIMEOUT_SECS", 90)),
            max_media_bytes: env_or::<u64>("PUBLISH_MAX_MEDIA_MB", 512) * 1024 * 1024,
            rate_limit: env_or("PUBLISH_RATE_LIMIT", 60),
            rate_window: Duration::from_secs(env_or("PUBLISH_RATE_WINDOW_SECS", 60)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers.workers == 0 {
            return Err(ConfigError::Invalid {
                name: "PUBLISH_WORKERS",
                reason: "must be at least 1".into(),
            });
        }
        if self.rate_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "PUBLISH_RATE_LIMIT",
                reason: "must be at least 1".into(),
            });
        }
        if self.rate_window.is_zero() {
            return Err(ConfigError::Invalid {
                name: "PUBLISH_RATE_WINDOW_SECS",
                reason: "must be at least 1".into(),
            });
        }
        if self.media_timeout < self.adapter_timeout {
            return Err(ConfigError::Invalid {
                name: "PUBLISH_MEDIA_TIMEOUT_SECS",
                reason: "must be at least the adapter timeout".into(),
            });
        }
        if InstagramAdapter::polls_for_budget(self.media_timeout) == 0 {
            return Err(ConfigError::Invalid {
                name: "PUBLISH_MEDIA_TIMEOUT_SECS",
                reason: format!(
                    "{}s leaves no time to wait for Instagram video processing",
                    self.media_timeout.as_secs()
                ),
            });
        }
        if self.max_media_bytes == 0 {
            return Err(ConfigError::Invalid {
                name: "PUBLISH_MAX_MEDIA_MB",
                reason: "must be at least 1".into(),
            });
        }
        self.validate_lease(Duration::ZERO)
    }

    /// Longest a single adapter call may run.
    pub fn longest_call(&self) -> Duration {
        self.adapter_timeout.max(self.media_timeout)
    }

    /// The lease must outlive the longest platform call plus the
    /// notification sent before the job settles.
    pub fn validate_lease(&self, notify_timeout: Duration) -> Result<(), ConfigError> {
        let attempt_budget = self.longest_call() + notify_timeout;
        if self.lease_duration <= attempt_budget {
            return Err(ConfigError::Invalid {
                name: "PUBLISH_LEASE_SECS",
                reason: format!(
                    "lease ({}s) must exceed the longest platform call plus notification ({}s)",
                    self.lease_duration.as_secs(),
                    attempt_budget.as_secs()
                ),
            });
        }
        Ok(())
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    #[cfg(feature = "postgres")]
    pub database: Option<DatabaseConfig>,
    pub queue_backend: QueueBackend,
    /// Shared secret guarding the worker endpoints. Unset disables them.
    pub worker_secret: Option<String>,
    pub token_encryption_key: Option<String>,
    pub notify_webhook: Option<WebhookNotifierConfig>,
    pub monitor_cron: String,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let queue_backend = env::var("QUEUE_BACKEND")
            .ok()
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or(QueueBackend::Memory);

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            #[cfg(feature = "postgres")]
            database: DatabaseConfig::from_env(),
            queue_backend,
            worker_secret: non_empty("WORKER_SECRET"),
            token_encryption_key: non_empty("TOKEN_ENCRYPTION_KEY"),
            notify_webhook: WebhookNotifierConfig::from_env(),
            monitor_cron: env::var("QUEUE_MONITOR_CRON")
                .unwrap_or_else(|_| "0 * * * * *".to_string()),
            pipeline: PipelineConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_encryption_key.is_none() {
            return Err(ConfigError::Missing("TOKEN_ENCRYPTION_KEY"));
        }
        #[cfg(not(feature = "redis"))]
        if self.queue_backend == QueueBackend::Redis {
            return Err(ConfigError::Invalid {
                name: "QUEUE_BACKEND",
                reason: "built without the `redis` feature".into(),
            });
        }
        self.pipeline.validate()?;

        let notify_timeout = self
            .notify_webhook
            .as_ref()
            .map(|webhook| webhook.timeout)
            .unwrap_or_default();
        self.pipeline.validate_lease(notify_timeout)
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".into(),
            port: 8080,
            #[cfg(feature = "postgres")]
            database: None,
            queue_backend: QueueBackend::Memory,
            worker_secret: Some("secret".into()),
            token_encryption_key: Some("passphrase".into()),
            notify_webhook: None,
            monitor_cron: "0 * * * * *".into(),
            pipeline: PipelineConfig::default(),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_lease_must_exceed_adapter_timeout() {
        let mut config = config();
        config.pipeline.lease_duration = Duration::from_secs(30);
        config.pipeline.adapter_timeout = Duration::from_secs(30);
        config.pipeline.media_timeout = Duration::from_secs(30);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "PUBLISH_LEASE_SECS", .. })
        ));
    }

    #[test]
    fn test_lease_must_cover_video_uploads() {
        let mut config = config();
        config.pipeline.lease_duration = Duration::from_secs(60);
        config.pipeline.media_timeout = Duration::from_secs(90);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "PUBLISH_LEASE_SECS", .. })
        ));
    }

    #[test]
    fn test_lease_must_cover_notification() {
        let mut config = config();
        config.pipeline.lease_duration = Duration::from_secs(95);
        assert!(config.validate().is_ok());

        config.notify_webhook = Some(WebhookNotifierConfig {
            url: "http://hooks.internal/publish".into(),
            timeout: Duration::from_secs(10),
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "PUBLISH_LEASE_SECS", .. })
        ));
    }

    #[test]
    fn test_media_timeout_bounds() {
        let mut config = config();
        config.pipeline.media_timeout = Duration::from_secs(10);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "PUBLISH_MEDIA_TIMEOUT_SECS", .. })
        ));

        // Too short for even one Instagram status poll.
        config.pipeline.adapter_timeout = Duration::from_secs(5);
        config.pipeline.media_timeout = Duration::from_secs(5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "PUBLISH_MEDIA_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = config();
        config.pipeline.workers.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut config = config();
        config.pipeline.rate_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_key_required() {
        let mut config = config();
        config.token_encryption_key = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("TOKEN_ENCRYPTION_KEY"))
        ));
    }

    #[test]
    fn test_queue_backend_parse() {
        assert_eq!("Redis".parse::<QueueBackend>().unwrap(), QueueBackend::Redis);
        assert_eq!("memory".parse::<QueueBackend>().unwrap(), QueueBackend::Memory);
        assert!("kafka".parse::<QueueBackend>().is_err());
    }
}
