//! Fixed-size pool of queue workers.
//!
//! Each worker loops permit -> claim -> run -> settle. Concurrency is bounded
//! by the number of workers; throughput is capped by the runner's rate limiter.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use herald_core::ports::ClaimedJob;
use herald_core::publishing::PublishRunner;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Sleep between polls when no job is due.
    pub poll_interval: Duration,
    /// Prefix for worker ids recorded on leases.
    pub worker_prefix: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval: Duration::from_millis(500),
            worker_prefix: "worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "local".to_string());
        Self {
            workers: std::env::var("PUBLISH_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            poll_interval: Duration::from_millis(
                std::env::var("PUBLISH_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            worker_prefix: format!("{host}-{}", std::process::id()),
        }
    }
}

/// Spawns and owns the worker tasks.
pub struct WorkerPool {
    runner: Arc<PublishRunner>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(runner: Arc<PublishRunner>, config: WorkerPoolConfig) -> Self {
        Self { runner, config }
    }

    /// Start the workers. They run until [`WorkerPoolHandle::shutdown`].
    pub fn start(self) -> WorkerPoolHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = self.config.workers.max(1);

        let tasks = (0..workers)
            .map(|i| {
                let worker = Worker {
                    id: format!("{}-{i}", self.config.worker_prefix),
                    runner: self.runner.clone(),
                    poll_interval: self.config.poll_interval,
                    shutdown: shutdown_rx.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        tracing::info!(
            workers,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Worker pool started"
        );

        WorkerPoolHandle { shutdown_tx, tasks }
    }
}

/// Handle to a running pool.
pub struct WorkerPoolHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Signal every worker and wait for in-flight jobs to settle.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

struct Worker {
    id: String,
    runner: Arc<PublishRunner>,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        tracing::debug!(worker_id = %self.id, "Worker started");
        // A permit taken before an empty poll is kept for the next claim.
        let mut holds_permit = false;

        while !*self.shutdown.borrow() {
            if !holds_permit {
                tokio::select! {
                    _ = self.runner.acquire_permit() => holds_permit = true,
                    _ = self.shutdown.changed() => continue,
                }
            }

            match self.runner.queue().claim_next(&self.id).await {
                Ok(Some(claimed)) => {
                    holds_permit = false;
                    self.run_job(claimed).await;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(worker_id = %self.id, error = %e, "Failed to claim job");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.shutdown.changed() => {}
            }
        }

        tracing::debug!(worker_id = %self.id, "Worker stopped");
    }

    /// Runs the job in its own task so a panicking adapter costs one
    /// attempt, not the worker.
    async fn run_job(&self, claimed: ClaimedJob) {
        let job_key = claimed.job.key.clone();
        let runner = self.runner.clone();
        let task = tokio::spawn({
            let claimed = claimed.clone();
            async move { runner.run_claimed(claimed).await }
        });

        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(worker_id = %self.id, job_key = %job_key, error = %e, "Job task panicked");
                self.runner
                    .abandon_claimed(claimed, &format!("job task panicked: {e}"))
                    .await
            }
        };

        match result {
            Ok(state) => {
                tracing::debug!(worker_id = %self.id, job_key = %job_key, state = ?state, "Job settled");
            }
            // LeaseLost here means another worker reclaimed the job after our lease expired.
            Err(e) => {
                tracing::warn!(worker_id = %self.id, job_key = %job_key, error = %e, "Failed to settle job");
            }
        }
    }
}
