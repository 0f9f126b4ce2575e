//! Application state - shared across all handlers and the worker pool.

use std::sync::Arc;

use herald_core::domain::Platform;
use herald_core::ports::{AccountStore, JobQueue, Notifier, PostStore, TokenCipher};
use herald_core::publishing::{Dispatcher, PublishRunner};
use herald_infra::jobs::{InMemoryJobQueue, InMemoryJobQueueConfig};
use herald_infra::notify::{LogNotifier, WebhookNotifier};
use herald_infra::{AesGcmCipher, InMemoryPublishingStore, PlatformEndpoints, PlatformHttp};

#[cfg(feature = "postgres")]
use herald_infra::PostgresPublishingStore;
#[cfg(feature = "rate-limit")]
use herald_infra::{InMemoryRateLimiter, RateLimitConfig};
#[cfg(feature = "redis")]
use herald_infra::{RedisJobQueue, RedisJobQueueConfig};

use crate::config::{AppConfig, ConfigError, QueueBackend};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<PublishRunner>,
    /// Platforms with a registered adapter.
    pub platforms: Vec<Platform>,
    pub queue_backend: &'static str,
    pub store_backend: &'static str,
    pub worker_secret: Option<Arc<str>>,
}

impl AppState {
    /// Build the pipeline from configuration.
    pub async fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let (posts, accounts, store_backend) = build_store(config).await?;
        let queue = build_queue(config).await?;

        let key = config
            .token_encryption_key
            .as_deref()
            .ok_or(ConfigError::Missing("TOKEN_ENCRYPTION_KEY"))?;
        let cipher: Arc<dyn TokenCipher> = Arc::new(AesGcmCipher::from_secret(key)?);

        let pipeline = &config.pipeline;
        let http = PlatformHttp::new(pipeline.adapter_timeout)?
            .with_max_media_bytes(pipeline.max_media_bytes);
        let media_http = PlatformHttp::new(pipeline.media_timeout)?
            .with_max_media_bytes(pipeline.max_media_bytes);
        let registry =
            herald_infra::default_registry(http, media_http, &PlatformEndpoints::default());
        let platforms = registry.platforms();

        let dispatcher = Dispatcher::new(
            posts.clone(),
            accounts,
            cipher,
            registry,
            pipeline.retry.clone(),
        )
        .with_adapter_timeout(pipeline.adapter_timeout)
        .with_platform_timeout(Platform::Youtube, pipeline.media_timeout)
        .with_platform_timeout(Platform::Instagram, pipeline.media_timeout);

        let notifier: Arc<dyn Notifier> = match &config.notify_webhook {
            Some(webhook) => {
                tracing::info!(url = %webhook.url, "Webhook notifications enabled");
                Arc::new(WebhookNotifier::new(webhook.clone())?)
            }
            None => {
                tracing::warn!("NOTIFY_WEBHOOK_URL not set. Notifications go to the log.");
                Arc::new(LogNotifier)
            }
        };

        let runner = PublishRunner::new(queue, posts, Arc::new(dispatcher), notifier);

        #[cfg(feature = "rate-limit")]
        let runner = runner.with_rate_limiter(Arc::new(InMemoryRateLimiter::new(
            RateLimitConfig {
                max_requests: config.pipeline.rate_limit,
                window: config.pipeline.rate_window,
            },
        )?));

        tracing::info!(
            queue_backend = config.queue_backend.as_str(),
            store_backend,
            platforms = platforms.len(),
            "Application state initialized"
        );

        Ok(Self {
            runner: Arc::new(runner),
            platforms,
            queue_backend: config.queue_backend.as_str(),
            store_backend,
            worker_secret: config.worker_secret.as_deref().map(Arc::from),
        })
    }
}

type Stores = (Arc<dyn PostStore>, Arc<dyn AccountStore>, &'static str);

fn in_memory_store() -> Stores {
    let store = Arc::new(InMemoryPublishingStore::new());
    (store.clone(), store, "memory")
}

#[cfg(feature = "postgres")]
async fn build_store(config: &AppConfig) -> anyhow::Result<Stores> {
    match &config.database {
        Some(database) => {
            let db = herald_infra::database::connect(database).await?;
            let store = Arc::new(PostgresPublishingStore::new(db));
            Ok((store.clone(), store, "postgres"))
        }
        None => {
            tracing::warn!("DATABASE_URL not set. Running with the in-memory store.");
            Ok(in_memory_store())
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn build_store(_config: &AppConfig) -> anyhow::Result<Stores> {
    tracing::info!("Running without postgres feature - using in-memory store");
    Ok(in_memory_store())
}

async fn build_queue(config: &AppConfig) -> anyhow::Result<Arc<dyn JobQueue>> {
    let lease_duration = config.pipeline.lease_duration;

    match config.queue_backend {
        QueueBackend::Memory => {
            tracing::warn!("Using the in-memory job queue. Jobs are lost on restart.");
            Ok(Arc::new(InMemoryJobQueue::new(InMemoryJobQueueConfig {
                lease_duration,
            })))
        }
        #[cfg(feature = "redis")]
        QueueBackend::Redis => {
            let queue = RedisJobQueue::new(RedisJobQueueConfig {
                lease_duration,
                ..RedisJobQueueConfig::from_env()
            })
            .await?;
            Ok(Arc::new(queue))
        }
        #[cfg(not(feature = "redis"))]
        QueueBackend::Redis => Err(ConfigError::Invalid {
            name: "QUEUE_BACKEND",
            reason: "built without the `redis` feature".into(),
        }
        .into()),
    }
}
