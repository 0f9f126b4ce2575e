//! Runs one publish attempt for one destination.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::formatter::format_for_platform;
use super::retry::{RetryDecision, RetryPolicy};
use crate::domain::{
    DestinationStatus, DestinationUpdate, Platform, PostDestination, PostStatus, PublishLogEntry,
    ScheduledPost,
};
use crate::error::RepoError;
use crate::ports::{
    AccountStore, AdapterRegistry, ErrorCategory, PostStore, PublishError, PublishJob,
    PublishRequest, TokenCipher,
};

/// State of a post's destinations after a terminal attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub post_id: Uuid,
    pub destination_id: Uuid,
    pub user_id: Uuid,
    pub platform: Option<Platform>,
    /// Statuses of every destination of the post right after this attempt.
    pub statuses: Vec<DestinationStatus>,
    /// The destination was already terminal before this run; nothing new happened.
    pub replayed: bool,
}

/// Result of a dispatch, consumed by the job runner.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Succeeded {
        platform_post_id: String,
        settlement: Settlement,
    },
    Retry {
        reason: String,
        delay: Duration,
    },
    TerminalFailure {
        reason: String,
        settlement: Settlement,
    },
    /// The post is gone; treated as cancellation, not failure.
    Aborted { reason: String },
}

/// Orchestrates a single (post, destination) publish attempt.
pub struct Dispatcher {
    posts: Arc<dyn PostStore>,
    accounts: Arc<dyn AccountStore>,
    cipher: Arc<dyn TokenCipher>,
    adapters: AdapterRegistry,
    retry: RetryPolicy,
    adapter_timeout: Duration,
    platform_timeouts: HashMap<Platform, Duration>,
}

impl Dispatcher {
    pub fn new(
        posts: Arc<dyn PostStore>,
        accounts: Arc<dyn AccountStore>,
        cipher: Arc<dyn TokenCipher>,
        adapters: AdapterRegistry,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            posts,
            accounts,
            cipher,
            adapters,
            retry,
            adapter_timeout: Duration::from_secs(30),
            platform_timeouts: HashMap::new(),
        }
    }

    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    /// Override the adapter timeout for one platform, e.g. video uploads.
    pub fn with_platform_timeout(mut self, platform: Platform, timeout: Duration) -> Self {
        self.platform_timeouts.insert(platform, timeout);
        self
    }

    fn timeout_for(&self, platform: Platform) -> Duration {
        self.platform_timeouts
            .get(&platform)
            .copied()
            .unwrap_or(self.adapter_timeout)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Dispatch the job's destination. Never fails: every error becomes an outcome.
    pub async fn dispatch(&self, job: &PublishJob) -> DispatchOutcome {
        match self.try_dispatch(job).await {
            Ok(outcome) => outcome,
            Err(e) => self.on_store_error(job, e).await,
        }
    }

    async fn try_dispatch(&self, job: &PublishJob) -> Result<DispatchOutcome, RepoError> {
        let payload = job.payload;
        let attempt = job.current_attempt();

        let Some(post) = self.posts.get_post(payload.post_id).await? else {
            tracing::info!(post_id = %payload.post_id, job_key = %job.key, "Post deleted, aborting dispatch");
            return Ok(DispatchOutcome::Aborted {
                reason: "post no longer exists".to_string(),
            });
        };

        let Some(destination) = self.posts.get_destination(payload.destination_id).await? else {
            tracing::info!(destination_id = %payload.destination_id, "Destination removed, aborting dispatch");
            return Ok(DispatchOutcome::Aborted {
                reason: "destination no longer exists".to_string(),
            });
        };

        if destination.status.is_terminal() {
            return self.replay(&post, &destination).await;
        }

        if job.is_exhausted() {
            tracing::error!(
                job_key = %job.key,
                attempt,
                max_attempts = job.max_attempts,
                "Job reclaimed after its last attempt, giving up"
            );
            return self
                .fail(
                    &post,
                    &destination,
                    None,
                    attempt,
                    "attempts_exhausted",
                    format!(
                        "claimed {} times without settling, limit is {}",
                        job.attempt, job.max_attempts
                    ),
                )
                .await;
        }

        if post.status == PostStatus::Scheduled {
            self.posts
                .update_post_status(post.id, PostStatus::Publishing)
                .await?;
        }

        let Some(account) = self.accounts.get_account(payload.account_id).await? else {
            return self
                .fail(&post, &destination, None, attempt, "account_not_found", "connected account no longer exists")
                .await;
        };
        let platform = account.platform;

        if !account.is_active {
            return self
                .fail(&post, &destination, Some(platform), attempt, "account_inactive", "connected account is disconnected")
                .await;
        }

        let Some(adapter) = self.adapters.get(platform) else {
            return self
                .fail(&post, &destination, Some(platform), attempt, "unsupported_platform", format!("no adapter registered for {platform}"))
                .await;
        };

        let content = format_for_platform(platform, post.text());

        let access_token = match self.cipher.decrypt(&account.encrypted_access_token) {
            Ok(token) => token,
            Err(e) => {
                return self
                    .fail(&post, &destination, Some(platform), attempt, "token_decrypt_failed", e.to_string())
                    .await;
            }
        };

        let options = post.options_for(platform);
        let request = PublishRequest {
            content: &content,
            media_urls: &post.media_urls,
            access_token: &access_token,
            platform_account_id: &account.platform_account_id,
            account_metadata: &account.metadata,
            options: &options,
        };

        tracing::debug!(
            post_id = %post.id,
            destination_id = %destination.id,
            platform = %platform,
            attempt,
            "Calling platform adapter"
        );

        let timeout = self.timeout_for(platform);
        let result = match tokio::time::timeout(timeout, adapter.publish(request)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(timeout)),
        };

        match result {
            Ok(platform_post_id) => {
                let statuses = self
                    .posts
                    .record_outcome(
                        DestinationUpdate::success(destination.id, platform_post_id.clone()),
                        PublishLogEntry::success(post.id, destination.id, platform, attempt),
                    )
                    .await?;

                tracing::info!(
                    post_id = %post.id,
                    destination_id = %destination.id,
                    platform = %platform,
                    platform_post_id = %platform_post_id,
                    attempt,
                    "Destination published"
                );

                Ok(DispatchOutcome::Succeeded {
                    platform_post_id,
                    settlement: Settlement {
                        post_id: post.id,
                        destination_id: destination.id,
                        user_id: post.user_id,
                        platform: Some(platform),
                        statuses,
                        replayed: false,
                    },
                })
            }
            Err(error) => {
                self.on_publish_error(job, &post, &destination, platform, error)
                    .await
            }
        }
    }

    async fn on_publish_error(
        &self,
        job: &PublishJob,
        post: &ScheduledPost,
        destination: &PostDestination,
        platform: Platform,
        error: PublishError,
    ) -> Result<DispatchOutcome, RepoError> {
        let attempt = job.current_attempt();
        let message = error.to_string();

        match self.retry.decide(&error, attempt, job.max_attempts) {
            RetryDecision::Retry(delay) => {
                self.posts
                    .record_outcome(
                        DestinationUpdate::retrying(destination.id, message.clone()),
                        PublishLogEntry::failure(post.id, destination.id, Some(platform), attempt, error.code(), message.clone()),
                    )
                    .await?;

                tracing::warn!(
                    post_id = %post.id,
                    destination_id = %destination.id,
                    platform = %platform,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "Publish failed, retry scheduled"
                );

                Ok(DispatchOutcome::Retry {
                    reason: message,
                    delay,
                })
            }
            RetryDecision::GiveUp(reason) => {
                if error.category() == ErrorCategory::Auth {
                    match self.accounts.deactivate_account(destination.account_id).await {
                        Ok(true) => tracing::warn!(account_id = %destination.account_id, "Account deactivated after auth failure"),
                        Ok(false) => {}
                        Err(e) => tracing::error!(account_id = %destination.account_id, error = %e, "Failed to deactivate account"),
                    }
                }

                tracing::error!(
                    post_id = %post.id,
                    destination_id = %destination.id,
                    platform = %platform,
                    attempt,
                    reason = ?reason,
                    error = %message,
                    "Publish failed permanently"
                );

                self.fail(post, destination, Some(platform), attempt, error.code(), message)
                    .await
            }
        }
    }

    /// Mark the destination failed and log the attempt.
    async fn fail(
        &self,
        post: &ScheduledPost,
        destination: &PostDestination,
        platform: Option<Platform>,
        attempt: u32,
        code: &str,
        message: impl Into<String>,
    ) -> Result<DispatchOutcome, RepoError> {
        let message = message.into();
        let statuses = self
            .posts
            .record_outcome(
                DestinationUpdate::failed(destination.id, message.clone()),
                PublishLogEntry::failure(post.id, destination.id, platform, attempt, code, message.clone()),
            )
            .await?;

        Ok(DispatchOutcome::TerminalFailure {
            reason: message,
            settlement: Settlement {
                post_id: post.id,
                destination_id: destination.id,
                user_id: post.user_id,
                platform,
                statuses,
                replayed: false,
            },
        })
    }

    /// A redelivered job whose destination already settled.
    async fn replay(
        &self,
        post: &ScheduledPost,
        destination: &PostDestination,
    ) -> Result<DispatchOutcome, RepoError> {
        tracing::info!(
            destination_id = %destination.id,
            status = %destination.status,
            "Destination already settled, skipping adapter call"
        );

        let statuses = self
            .posts
            .list_destinations(post.id)
            .await?
            .into_iter()
            .map(|d| d.status)
            .collect();

        let settlement = Settlement {
            post_id: post.id,
            destination_id: destination.id,
            user_id: post.user_id,
            platform: None,
            statuses,
            replayed: true,
        };

        Ok(match destination.status {
            DestinationStatus::Success => DispatchOutcome::Succeeded {
                platform_post_id: destination.platform_post_id.clone().unwrap_or_default(),
                settlement,
            },
            _ => DispatchOutcome::TerminalFailure {
                reason: destination.error_message.clone().unwrap_or_default(),
                settlement,
            },
        })
    }

    /// Store failures default to retrying until the job runs out of attempts.
    async fn on_store_error(&self, job: &PublishJob, error: RepoError) -> DispatchOutcome {
        tracing::error!(job_key = %job.key, attempt = job.current_attempt(), error = %error, "Store error during dispatch");
        self.retry_or_give_up(job, "store_error", error.to_string()).await
    }

    /// Outcome for an attempt that died before it could settle, e.g. a
    /// panicking adapter. Counts as a failed attempt.
    pub async fn abandon(&self, job: &PublishJob, reason: &str) -> DispatchOutcome {
        tracing::error!(job_key = %job.key, attempt = job.current_attempt(), reason, "Attempt abandoned");
        self.retry_or_give_up(job, "attempt_crashed", reason.to_string()).await
    }

    async fn retry_or_give_up(&self, job: &PublishJob, code: &str, error: String) -> DispatchOutcome {
        let attempt = job.current_attempt();
        if attempt < job.max_attempts {
            return DispatchOutcome::Retry {
                reason: error,
                delay: self.retry.backoff_delay(attempt),
            };
        }

        let payload = job.payload;
        let message = format!("giving up after {code}: {error}");
        let statuses = match self
            .posts
            .record_outcome(
                DestinationUpdate::failed(payload.destination_id, message.clone()),
                PublishLogEntry::failure(payload.post_id, payload.destination_id, None, attempt, code, message.clone()),
            )
            .await
        {
            Ok(statuses) => statuses,
            Err(e) => {
                tracing::error!(job_key = %job.key, error = %e, "Could not record terminal failure");
                Vec::new()
            }
        };

        let user_id = match self.posts.get_post(payload.post_id).await {
            Ok(Some(post)) => post.user_id,
            _ => {
                return DispatchOutcome::Aborted { reason: message };
            }
        };

        DispatchOutcome::TerminalFailure {
            reason: message,
            settlement: Settlement {
                post_id: payload.post_id,
                destination_id: payload.destination_id,
                user_id,
                platform: None,
                statuses,
                replayed: false,
            },
        }
    }
}
