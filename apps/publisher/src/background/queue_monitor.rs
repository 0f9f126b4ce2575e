//! Cron heartbeat that logs job queue statistics.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use herald_core::ports::{JobQueue, QueueStats};

/// Periodic queue stats logger driven by tokio-cron-scheduler.
pub struct QueueMonitor {
    inner: JobScheduler,
}

impl QueueMonitor {
    /// Register the heartbeat on `schedule` (six fields, seconds first) and start it.
    pub async fn start(
        queue: Arc<dyn JobQueue>,
        schedule: &str,
    ) -> Result<Self, JobSchedulerError> {
        let inner = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let queue = queue.clone();
            Box::pin(async move {
                log_queue_stats(queue.as_ref()).await;
            })
        })?;

        let id = inner.add(job).await?;
        inner.start().await?;
        tracing::info!(schedule = %schedule, job_id = %id, "Queue monitor started");

        Ok(Self { inner })
    }

    pub async fn shutdown(mut self) -> Result<(), JobSchedulerError> {
        self.inner.shutdown().await?;
        tracing::info!("Queue monitor stopped");
        Ok(())
    }
}

pub(crate) async fn log_queue_stats(queue: &dyn JobQueue) -> Option<QueueStats> {
    match queue.stats().await {
        Ok(stats) => {
            tracing::info!(
                pending = stats.pending,
                processing = stats.processing,
                completed = stats.completed,
                requeued = stats.requeued,
                "Queue stats"
            );
            Some(stats)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read queue stats");
            None
        }
    }
}
