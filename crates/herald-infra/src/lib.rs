//! # Herald Infrastructure
//!
//! Concrete implementations of the ports defined in `herald-core`:
//! job queues and the worker pool, publishing stores, platform adapters,
//! token encryption and notification sinks.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory only
//! - `postgres` - PostgreSQL publishing store via SeaORM
//! - `rate-limit` - Dispatch throttling via governor
//! - `redis` - Redis-backed job queue

pub mod crypto;
pub mod database;
pub mod jobs;
pub mod notify;
pub mod platforms;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

// Re-exports - In-Memory
pub use crypto::{AesGcmCipher, PlaintextCipher};
pub use database::InMemoryPublishingStore;
pub use jobs::{InMemoryJobQueue, WorkerPool, WorkerPoolConfig, WorkerPoolHandle};
pub use notify::{LogNotifier, WebhookNotifier};
pub use platforms::{PlatformEndpoints, PlatformHttp, default_registry};

#[cfg(feature = "postgres")]
pub use database::{DatabaseConfig, PostgresPublishingStore};

#[cfg(feature = "rate-limit")]
pub use rate_limit::{InMemoryRateLimiter, RateLimitConfig};

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use jobs::{RedisConfig, RedisJobQueue, RedisJobQueueConfig};
