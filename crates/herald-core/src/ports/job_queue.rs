//! Job queue port - abstraction over delayed publish-job backends.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default number of dispatch attempts before a destination fails terminally.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Identifies which destination a job publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishPayload {
    pub post_id: Uuid,
    pub account_id: Uuid,
    pub destination_id: Uuid,
}

/// A pending publish attempt for one destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishJob {
    /// Dedup key, `{post_id}-{account_id}`.
    pub key: String,
    pub payload: PublishPayload,
    /// Earliest time the job may be claimed.
    pub run_at: DateTime<Utc>,
    /// Attempts started. Bumped by every claim, so a lease abandoned by a
    /// crashed worker still counts against `max_attempts`.
    pub attempt: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl PublishJob {
    pub fn new(payload: PublishPayload) -> Self {
        let now = Utc::now();
        Self {
            key: Self::dedup_key(payload.post_id, payload.account_id),
            payload,
            run_at: now,
            attempt: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            created_at: now,
        }
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    pub fn dedup_key(post_id: Uuid, account_id: Uuid) -> String {
        format!("{post_id}-{account_id}")
    }

    /// Number of the attempt the current claim performs (1-based).
    pub fn current_attempt(&self) -> u32 {
        self.attempt.max(1)
    }

    /// Claimed more often than allowed: earlier holders died mid-attempt.
    pub fn is_exhausted(&self) -> bool {
        self.attempt > self.max_attempts
    }
}

/// Exclusive claim on a job, valid until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub worker_id: String,
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// A job removed from the ready set and held by one worker.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job: PublishJob,
    pub lease: Lease,
}

/// What an enqueue did with the dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// No job existed for the key.
    Inserted,
    /// A pending job existed and was rescheduled in place.
    Updated,
    /// The key is currently claimed by a worker; nothing changed.
    InFlight,
}

/// Job queue trait - durable, time-ordered store of publish jobs.
///
/// At most one entry exists per dedup key, and a claimed key cannot be
/// claimed again until it is requeued, completed, or its lease expires.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Insert or reschedule the job so it runs no earlier than `now + delay`.
    async fn enqueue(&self, job: PublishJob, delay: Duration)
    -> Result<EnqueueOutcome, JobQueueError>;

    /// Claim the earliest due job, if any. Every claim bumps `attempt`.
    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedJob>, JobQueueError>;

    /// Claim a specific job regardless of its `run_at`, if it is not leased.
    /// Bumps `attempt` like [`JobQueue::claim_next`].
    async fn claim(&self, key: &str, worker_id: &str)
    -> Result<Option<ClaimedJob>, JobQueueError>;

    /// Release a claim and reschedule it. The attempt counter is kept.
    async fn requeue(&self, claimed: ClaimedJob, delay: Duration) -> Result<(), JobQueueError>;

    /// Remove a claimed job permanently.
    async fn complete(&self, claimed: ClaimedJob) -> Result<(), JobQueueError>;

    /// Get queue statistics.
    async fn stats(&self) -> Result<QueueStats, JobQueueError>;
}

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub requeued: usize,
}

/// Job queue errors.
#[derive(Debug, thiserror::Error)]
pub enum JobQueueError {
    #[error("Failed to serialize job: {0}")]
    Serialization(String),

    #[error("Lease on job {0} expired or was taken over")]
    LeaseLost(String),

    #[error("Invalid delay: {0}")]
    InvalidDelay(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// `now + delay` in wall-clock time.
pub fn run_at_after(delay: Duration) -> Result<DateTime<Utc>, JobQueueError> {
    let delay =
        chrono::Duration::from_std(delay).map_err(|e| JobQueueError::InvalidDelay(e.to_string()))?;
    Ok(Utc::now() + delay)
}
