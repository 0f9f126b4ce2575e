//! Settles claimed publish jobs: dispatch, queue bookkeeping, post status
//! aggregation and notifications. Shared by the worker pool and the manual
//! trigger so both follow the same state machine.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::aggregator::aggregate_post_status;
use super::dispatcher::{DispatchOutcome, Dispatcher, Settlement};
use crate::domain::{DestinationStatus, PostStatus};
use crate::error::DomainError;
use crate::ports::{
    ClaimedJob, EnqueueOutcome, JobQueue, JobQueueError, NotificationKind, Notifier, PostStore,
    PublishJob, PublishPayload, RateLimiter,
};

/// Rate limiter key shared by every dispatch.
pub const DISPATCH_RATE_KEY: &str = "dispatch";

/// Terminal state of one claimed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AttemptState {
    Succeeded,
    RetryScheduled {
        #[serde(rename = "delayMs", serialize_with = "serialize_millis")]
        delay: Duration,
    },
    TerminallyFailed,
    Aborted,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Per-destination result of a manual trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TriggerResult {
    Attempted { attempt: AttemptState },
    /// Another worker holds the job right now.
    InFlight,
    AlreadySettled { status: DestinationStatus },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerReport {
    pub destination_id: Uuid,
    pub account_id: Uuid,
    #[serde(flatten)]
    pub result: TriggerResult,
}

pub struct PublishRunner {
    queue: Arc<dyn JobQueue>,
    posts: Arc<dyn PostStore>,
    dispatcher: Arc<Dispatcher>,
    notifier: Arc<dyn Notifier>,
    limiter: Option<Arc<dyn RateLimiter>>,
}

impl PublishRunner {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        posts: Arc<dyn PostStore>,
        dispatcher: Arc<Dispatcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            queue,
            posts,
            dispatcher,
            notifier,
            limiter: None,
        }
    }

    /// Throttle dispatches through a shared rate limiter.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// Wait for a dispatch permit. Call before claiming so the wait never
    /// eats into a lease. Limiter errors fail open.
    pub async fn acquire_permit(&self) {
        if let Some(limiter) = &self.limiter {
            if let Err(e) = limiter.acquire(DISPATCH_RATE_KEY).await {
                tracing::error!(error = %e, "Rate limiter error, dispatching anyway");
            }
        }
    }

    /// Dispatch a claimed job and settle it in the queue.
    pub async fn run_claimed(&self, claimed: ClaimedJob) -> Result<AttemptState, JobQueueError> {
        tracing::debug!(
            job_key = %claimed.job.key,
            worker_id = %claimed.lease.worker_id,
            attempt = claimed.job.current_attempt(),
            "Dispatching job"
        );

        let outcome = self.dispatcher.dispatch(&claimed.job).await;
        self.finish(claimed, outcome).await
    }

    /// Settle a claim whose attempt died without producing an outcome.
    pub async fn abandon_claimed(
        &self,
        claimed: ClaimedJob,
        reason: &str,
    ) -> Result<AttemptState, JobQueueError> {
        let outcome = self.dispatcher.abandon(&claimed.job, reason).await;
        self.finish(claimed, outcome).await
    }

    async fn finish(
        &self,
        claimed: ClaimedJob,
        outcome: DispatchOutcome,
    ) -> Result<AttemptState, JobQueueError> {
        match outcome {
            DispatchOutcome::Succeeded { settlement, .. } => {
                self.settle(NotificationKind::PostPublished, &settlement, None)
                    .await;
                self.queue.complete(claimed).await?;
                Ok(AttemptState::Succeeded)
            }
            DispatchOutcome::Retry { delay, .. } => {
                self.queue.requeue(claimed, delay).await?;
                Ok(AttemptState::RetryScheduled { delay })
            }
            DispatchOutcome::TerminalFailure { reason, settlement } => {
                self.settle(NotificationKind::PostFailed, &settlement, Some(&reason))
                    .await;
                self.queue.complete(claimed).await?;
                Ok(AttemptState::TerminallyFailed)
            }
            DispatchOutcome::Aborted { reason } => {
                tracing::info!(job_key = %claimed.job.key, reason = %reason, "Job aborted");
                self.queue.complete(claimed).await?;
                Ok(AttemptState::Aborted)
            }
        }
    }

    /// Recompute the post status and emit the first notification of each kind.
    async fn settle(&self, kind: NotificationKind, settlement: &Settlement, error: Option<&str>) {
        if let Some(status) = aggregate_post_status(&settlement.statuses) {
            if let Err(e) = self
                .posts
                .update_post_status(settlement.post_id, status)
                .await
            {
                tracing::error!(post_id = %settlement.post_id, error = %e, "Failed to update post status");
            }
        }

        if settlement.replayed {
            return;
        }

        let target = match kind {
            NotificationKind::PostPublished => DestinationStatus::Success,
            NotificationKind::PostFailed => DestinationStatus::Failed,
        };
        let settled_of_kind = settlement.statuses.iter().filter(|s| **s == target).count();
        if settled_of_kind != 1 {
            return;
        }

        let payload = serde_json::json!({
            "postId": settlement.post_id,
            "destinationId": settlement.destination_id,
            "platform": settlement.platform,
            "error": error,
        });

        if let Err(e) = self.notifier.trigger(settlement.user_id, kind, payload).await {
            tracing::warn!(post_id = %settlement.post_id, kind = %kind, error = %e, "Notification failed");
        }
    }

    /// Enqueue one job per pending destination, delayed until the post's
    /// scheduled time.
    pub async fn schedule_post(&self, post_id: Uuid) -> Result<Vec<EnqueueOutcome>, DomainError> {
        let post = self
            .posts
            .get_post(post_id)
            .await?
            .ok_or(DomainError::NotFound {
                entity_type: "post",
                id: post_id,
            })?;

        if !post.status.is_editable() {
            return Err(DomainError::Validation(format!(
                "post is already {}",
                post.status
            )));
        }

        let delay = (post.scheduled_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let max_attempts = self.dispatcher.retry_policy().max_attempts;

        let mut outcomes = Vec::new();
        for destination in self.posts.list_destinations(post_id).await? {
            if destination.status != DestinationStatus::Pending {
                continue;
            }
            let job = PublishJob::new(PublishPayload {
                post_id,
                account_id: destination.account_id,
                destination_id: destination.id,
            })
            .with_max_attempts(max_attempts);

            outcomes.push(self.queue.enqueue(job, delay).await?);
        }

        if post.status == PostStatus::Draft {
            self.posts
                .update_post_status(post_id, PostStatus::Scheduled)
                .await?;
        }

        tracing::info!(
            post_id = %post_id,
            jobs = outcomes.len(),
            delay_secs = delay.as_secs(),
            "Post scheduled"
        );

        Ok(outcomes)
    }

    /// Run every pending destination of a post now, in the caller's task.
    ///
    /// Retries produced here stay in the queue for the worker pool.
    pub async fn trigger_post(
        &self,
        post_id: Uuid,
        worker_id: &str,
    ) -> Result<Vec<TriggerReport>, DomainError> {
        if self.posts.get_post(post_id).await?.is_none() {
            return Err(DomainError::NotFound {
                entity_type: "post",
                id: post_id,
            });
        }

        let max_attempts = self.dispatcher.retry_policy().max_attempts;
        let mut reports = Vec::new();

        for destination in self.posts.list_destinations(post_id).await? {
            let result = if destination.status.is_terminal() {
                TriggerResult::AlreadySettled {
                    status: destination.status,
                }
            } else {
                let job = PublishJob::new(PublishPayload {
                    post_id,
                    account_id: destination.account_id,
                    destination_id: destination.id,
                })
                .with_max_attempts(max_attempts);
                let key = job.key.clone();

                match self.queue.enqueue(job, Duration::ZERO).await? {
                    EnqueueOutcome::InFlight => TriggerResult::InFlight,
                    EnqueueOutcome::Inserted | EnqueueOutcome::Updated => {
                        self.acquire_permit().await;
                        match self.queue.claim(&key, worker_id).await? {
                            Some(claimed) => TriggerResult::Attempted {
                                attempt: self.run_claimed(claimed).await?,
                            },
                            None => TriggerResult::InFlight,
                        }
                    }
                }
            };

            reports.push(TriggerReport {
                destination_id: destination.id,
                account_id: destination.account_id,
                result,
            });
        }

        Ok(reports)
    }
}
