//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod crypto;
mod job_queue;
mod notify;
mod platform;
mod rate_limit;
mod repository;

pub use crypto::{CryptoError, TokenCipher};
pub use job_queue::{
    ClaimedJob, DEFAULT_MAX_ATTEMPTS, EnqueueOutcome, JobQueue, JobQueueError, Lease,
    PublishJob, PublishPayload, QueueStats, run_at_after,
};
pub use notify::{NotificationKind, Notifier, NotifyError};
pub use platform::{AdapterRegistry, ErrorCategory, PlatformAdapter, PublishError, PublishRequest};
pub use rate_limit::{RateLimitError, RateLimitResult, RateLimiter};
pub use repository::{AccountStore, PostStore};
