//! In-memory job queue implementation.
//!
//! This is a fallback when Redis is not available.
//! Jobs live in a map keyed by dedup key and are claimed under a lease.
//! Note: Jobs are lost on server restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use herald_core::ports::{
    ClaimedJob, EnqueueOutcome, JobQueue, JobQueueError, Lease, PublishJob, QueueStats,
    run_at_after,
};

/// In-memory job queue configuration.
#[derive(Debug, Clone)]
pub struct InMemoryJobQueueConfig {
    /// How long a claim stays exclusive.
    pub lease_duration: Duration,
}

impl Default for InMemoryJobQueueConfig {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(120),
        }
    }
}

struct Entry {
    job: PublishJob,
    lease: Option<Lease>,
}

impl Entry {
    fn is_leased(&self, now: DateTime<Utc>) -> bool {
        self.lease.as_ref().is_some_and(|l| l.expires_at > now)
    }

    fn holds(&self, lease: &Lease) -> bool {
        self.lease.as_ref().is_some_and(|l| l.token == lease.token)
    }
}

/// In-memory job queue.
pub struct InMemoryJobQueue {
    entries: Mutex<HashMap<String, Entry>>,
    config: InMemoryJobQueueConfig,
    completed: AtomicUsize,
    requeued: AtomicUsize,
}

impl InMemoryJobQueue {
    pub fn new(config: InMemoryJobQueueConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            completed: AtomicUsize::new(0),
            requeued: AtomicUsize::new(0),
        }
    }

    pub fn from_env() -> Self {
        Self::new(InMemoryJobQueueConfig {
            lease_duration: Duration::from_secs(
                std::env::var("PUBLISH_LEASE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        })
    }

    fn new_lease(&self, worker_id: &str) -> Result<Lease, JobQueueError> {
        Ok(Lease {
            worker_id: worker_id.to_string(),
            token: Uuid::new_v4(),
            expires_at: run_at_after(self.config.lease_duration)?,
        })
    }

    /// Snapshot of the stored job for a key (test and diagnostics helper).
    pub async fn peek(&self, key: &str) -> Option<PublishJob> {
        self.entries.lock().await.get(key).map(|e| e.job.clone())
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new(InMemoryJobQueueConfig::default())
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(
        &self,
        job: PublishJob,
        delay: Duration,
    ) -> Result<EnqueueOutcome, JobQueueError> {
        let run_at = run_at_after(delay)?;
        let now = Utc::now();
        let mut entries = self.entries.lock().await;

        let outcome = match entries.get_mut(&job.key) {
            Some(entry) if entry.is_leased(now) => EnqueueOutcome::InFlight,
            Some(entry) => {
                // Keep the attempt counter so re-enqueueing cannot reset retries.
                entry.job.payload = job.payload;
                entry.job.max_attempts = job.max_attempts;
                entry.job.run_at = run_at;
                entry.lease = None;
                EnqueueOutcome::Updated
            }
            None => {
                let key = job.key.clone();
                entries.insert(
                    key,
                    Entry {
                        job: PublishJob { run_at, ..job },
                        lease: None,
                    },
                );
                EnqueueOutcome::Inserted
            }
        };

        tracing::debug!(outcome = ?outcome, queue_size = entries.len(), "Job enqueued");
        Ok(outcome)
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedJob>, JobQueueError> {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries
            .values_mut()
            .filter(|e| !e.is_leased(now) && e.job.run_at <= now)
            .min_by_key(|e| e.job.run_at)
        else {
            return Ok(None);
        };

        let lease = self.new_lease(worker_id)?;
        entry.lease = Some(lease.clone());
        entry.job.attempt += 1;
        Ok(Some(ClaimedJob {
            job: entry.job.clone(),
            lease,
        }))
    }

    async fn claim(
        &self,
        key: &str,
        worker_id: &str,
    ) -> Result<Option<ClaimedJob>, JobQueueError> {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries.get_mut(key).filter(|e| !e.is_leased(now)) else {
            return Ok(None);
        };

        let lease = self.new_lease(worker_id)?;
        entry.lease = Some(lease.clone());
        entry.job.attempt += 1;
        Ok(Some(ClaimedJob {
            job: entry.job.clone(),
            lease,
        }))
    }

    async fn requeue(&self, claimed: ClaimedJob, delay: Duration) -> Result<(), JobQueueError> {
        let run_at = run_at_after(delay)?;
        let mut entries = self.entries.lock().await;

        let entry = entries
            .get_mut(&claimed.job.key)
            .filter(|e| e.holds(&claimed.lease))
            .ok_or_else(|| JobQueueError::LeaseLost(claimed.job.key.clone()))?;

        entry.job.run_at = run_at;
        entry.lease = None;
        self.requeued.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            job_key = %claimed.job.key,
            attempt = entry.job.attempt,
            run_at = %run_at,
            "Job requeued"
        );
        Ok(())
    }

    async fn complete(&self, claimed: ClaimedJob) -> Result<(), JobQueueError> {
        let mut entries = self.entries.lock().await;

        if !entries
            .get(&claimed.job.key)
            .is_some_and(|e| e.holds(&claimed.lease))
        {
            return Err(JobQueueError::LeaseLost(claimed.job.key));
        }

        entries.remove(&claimed.job.key);
        self.completed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, JobQueueError> {
        let now = Utc::now();
        let entries = self.entries.lock().await;
        let processing = entries.values().filter(|e| e.is_leased(now)).count();

        Ok(QueueStats {
            pending: entries.len() - processing,
            processing,
            completed: self.completed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
        })
    }
}
