//! End-to-end pipeline tests: in-memory queue and store, scripted adapters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use herald_core::domain::{
    AttemptStatus, DestinationStatus, DestinationUpdate, Platform, PostDestination, PostStatus,
    PublishLogEntry, ScheduledPost, SocialAccount,
};
use herald_core::error::RepoError;
use herald_core::ports::{
    AccountStore, AdapterRegistry, EnqueueOutcome, JobQueue, NotificationKind, Notifier,
    NotifyError, PlatformAdapter, PostStore, PublishError, PublishJob, PublishPayload,
    PublishRequest, RateLimitError, RateLimitResult, RateLimiter,
};
use herald_core::publishing::{
    AttemptState, Dispatcher, PublishRunner, RetryPolicy, TriggerResult,
};

use crate::crypto::PlaintextCipher;
use crate::database::InMemoryPublishingStore;
use crate::jobs::{InMemoryJobQueue, InMemoryJobQueueConfig, WorkerPool, WorkerPoolConfig};

struct ScriptedAdapter {
    platform: Platform,
    script: Mutex<VecDeque<Result<String, PublishError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAdapter {
    fn new(platform: Platform, script: Vec<Result<String, PublishError>>) -> Arc<Self> {
        Arc::new(Self {
            platform,
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformAdapter for ScriptedAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn validate_token(&self, _access_token: &str) -> Result<bool, PublishError> {
        Ok(true)
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, PublishError> {
        self.calls.lock().unwrap().push(request.content.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("default-id".to_string()))
    }
}

/// Panics on every publish.
#[derive(Default)]
struct PanickingAdapter {
    calls: AtomicUsize,
}

#[async_trait]
impl PlatformAdapter for PanickingAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn validate_token(&self, _access_token: &str) -> Result<bool, PublishError> {
        Ok(true)
    }

    async fn publish(&self, _request: PublishRequest<'_>) -> Result<String, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("adapter bug");
    }
}

/// Answers only after `delay`.
struct SlowAdapter {
    delay: Duration,
}

#[async_trait]
impl PlatformAdapter for SlowAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn validate_token(&self, _access_token: &str) -> Result<bool, PublishError> {
        Ok(true)
    }

    async fn publish(&self, _request: PublishRequest<'_>) -> Result<String, PublishError> {
        tokio::time::sleep(self.delay).await;
        Ok("late".to_string())
    }
}

/// Post store whose destination reads fail while `broken` is set.
struct FlakyPostStore {
    inner: Arc<InMemoryPublishingStore>,
    broken: AtomicBool,
}

#[async_trait]
impl PostStore for FlakyPostStore {
    async fn get_post(&self, id: Uuid) -> Result<Option<ScheduledPost>, RepoError> {
        self.inner.get_post(id).await
    }

    async fn get_destination(&self, id: Uuid) -> Result<Option<PostDestination>, RepoError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(RepoError::Connection("connection reset".into()));
        }
        self.inner.get_destination(id).await
    }

    async fn list_destinations(&self, post_id: Uuid) -> Result<Vec<PostDestination>, RepoError> {
        self.inner.list_destinations(post_id).await
    }

    async fn record_outcome(
        &self,
        update: DestinationUpdate,
        entry: PublishLogEntry,
    ) -> Result<Vec<DestinationStatus>, RepoError> {
        self.inner.record_outcome(update, entry).await
    }

    async fn update_post_status(&self, post_id: Uuid, status: PostStatus) -> Result<(), RepoError> {
        self.inner.update_post_status(post_id, status).await
    }

    async fn list_logs(&self, post_id: Uuid) -> Result<Vec<PublishLogEntry>, RepoError> {
        self.inner.list_logs(post_id).await
    }
}

/// Grants every permit and records how many jobs were leased while waiting.
struct LeaseObservingLimiter {
    queue: Arc<InMemoryJobQueue>,
    leased_while_waiting: Mutex<Vec<usize>>,
}

#[async_trait]
impl RateLimiter for LeaseObservingLimiter {
    async fn check(&self, _key: &str) -> Result<RateLimitResult, RateLimitError> {
        Ok(RateLimitResult {
            allowed: true,
            remaining: 1,
            reset_after: Duration::ZERO,
        })
    }

    async fn acquire(&self, _key: &str) -> Result<(), RateLimitError> {
        let processing = self
            .queue
            .stats()
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?
            .processing;
        self.leased_while_waiting.lock().unwrap().push(processing);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(Uuid, NotificationKind, serde_json::Value)>>,
}

impl RecordingNotifier {
    fn count(&self, kind: NotificationKind) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn trigger(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((user_id, kind, payload));
        Ok(())
    }
}

struct Harness {
    store: Arc<InMemoryPublishingStore>,
    queue: Arc<InMemoryJobQueue>,
    notifier: Arc<RecordingNotifier>,
    runner: Arc<PublishRunner>,
}

impl Harness {
    fn new(adapters: &[Arc<ScriptedAdapter>]) -> Self {
        let adapters = adapters
            .iter()
            .map(|adapter| adapter.clone() as Arc<dyn PlatformAdapter>)
            .collect();
        Self::build(adapters, InMemoryJobQueueConfig::default(), |dispatcher| dispatcher)
    }

    fn build(
        adapters: Vec<Arc<dyn PlatformAdapter>>,
        queue_config: InMemoryJobQueueConfig,
        tune: impl FnOnce(Dispatcher) -> Dispatcher,
    ) -> Self {
        let store = Arc::new(InMemoryPublishingStore::new());
        let queue = Arc::new(InMemoryJobQueue::new(queue_config));
        let notifier = Arc::new(RecordingNotifier::default());

        let registry = adapters
            .into_iter()
            .fold(AdapterRegistry::new(), |registry, adapter| registry.with(adapter));
        let dispatcher = tune(Dispatcher::new(
            store.clone(),
            store.clone(),
            Arc::new(PlaintextCipher),
            registry,
            RetryPolicy::default(),
        ));
        let runner = PublishRunner::new(
            queue.clone(),
            store.clone(),
            Arc::new(dispatcher),
            notifier.clone(),
        );

        Self {
            store,
            queue,
            notifier,
            runner: Arc::new(runner),
        }
    }

    /// A post due now with one destination per platform.
    async fn seed_post(&self, content: &str, platforms: &[Platform]) -> (ScheduledPost, Vec<PostDestination>) {
        let user_id = Uuid::new_v4();
        let post = ScheduledPost::new(user_id, Some(content.to_string()), vec![], Utc::now()).unwrap();
        self.store.insert_post(post.clone()).await;

        let mut destinations = Vec::new();
        for platform in platforms {
            let account = SocialAccount::new(user_id, *platform, "plain-token", format!("{platform}-acct"));
            let destination = PostDestination::new(post.id, account.id);
            self.store.insert_account(account).await;
            self.store.insert_destination(destination.clone()).await.unwrap();
            destinations.push(destination);
        }

        (post, destinations)
    }

    async fn run(&self, destination: &PostDestination) -> Option<AttemptState> {
        let key = PublishJob::dedup_key(destination.post_id, destination.account_id);
        let claimed = self.queue.claim(&key, "test-worker").await.unwrap()?;
        Some(self.runner.run_claimed(claimed).await.unwrap())
    }

    async fn destination_status(&self, destination: &PostDestination) -> DestinationStatus {
        self.store
            .get_destination(destination.id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    async fn post_status(&self, post_id: Uuid) -> PostStatus {
        self.store.get_post(post_id).await.unwrap().unwrap().status
    }
}

fn upstream_500() -> Result<String, PublishError> {
    Err(PublishError::Upstream {
        status: 500,
        message: "Internal Server Error".into(),
    })
}

#[tokio::test]
async fn test_single_destination_publishes() {
    let twitter = ScriptedAdapter::new(Platform::Twitter, vec![Ok("123".into())]);
    let harness = Harness::new(&[twitter.clone()]);
    let (post, destinations) = harness.seed_post("Hello", &[Platform::Twitter]).await;

    let outcomes = harness.runner.schedule_post(post.id).await.unwrap();
    assert_eq!(outcomes, vec![EnqueueOutcome::Inserted]);

    let claimed = harness.queue.claim_next("w1").await.unwrap().unwrap();
    let state = harness.runner.run_claimed(claimed).await.unwrap();

    assert_eq!(state, AttemptState::Succeeded);
    assert_eq!(twitter.calls(), vec!["Hello".to_string()]);

    let destination = harness.store.get_destination(destinations[0].id).await.unwrap().unwrap();
    assert_eq!(destination.status, DestinationStatus::Success);
    assert_eq!(destination.platform_post_id.as_deref(), Some("123"));
    assert_eq!(harness.post_status(post.id).await, PostStatus::Published);
    assert_eq!(harness.notifier.count(NotificationKind::PostPublished), 1);
    assert_eq!(harness.notifier.count(NotificationKind::PostFailed), 0);
    assert_eq!(harness.queue.stats().await.unwrap().pending, 0);
}

#[tokio::test]
async fn test_invalid_token_fails_without_retry() {
    let twitter = ScriptedAdapter::new(
        Platform::Twitter,
        vec![Err(PublishError::Auth("invalid token".into()))],
    );
    let harness = Harness::new(&[twitter.clone()]);
    let (post, destinations) = harness.seed_post("Hello", &[Platform::Twitter]).await;
    harness.runner.schedule_post(post.id).await.unwrap();

    assert_eq!(
        harness.run(&destinations[0]).await,
        Some(AttemptState::TerminallyFailed)
    );
    // Completed, so nothing left to claim.
    assert_eq!(harness.run(&destinations[0]).await, None);

    assert_eq!(twitter.calls().len(), 1);
    assert_eq!(harness.destination_status(&destinations[0]).await, DestinationStatus::Failed);
    assert_eq!(harness.post_status(post.id).await, PostStatus::Failed);
    assert_eq!(harness.notifier.count(NotificationKind::PostFailed), 1);

    let account = harness
        .store
        .get_account(destinations[0].account_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!account.is_active);

    let logs = harness.store.list_logs(post.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error_code.as_deref(), Some("auth_error"));
}

#[tokio::test]
async fn test_transient_failures_back_off_then_succeed() {
    let twitter = ScriptedAdapter::new(
        Platform::Twitter,
        vec![upstream_500(), upstream_500(), upstream_500(), Ok("123".into())],
    );
    let harness = Harness::new(&[twitter.clone()]);
    let (post, destinations) = harness.seed_post("Hello", &[Platform::Twitter]).await;
    harness.runner.schedule_post(post.id).await.unwrap();
    let key = PublishJob::dedup_key(post.id, destinations[0].account_id);

    let mut previous_delay = Duration::ZERO;
    for attempt in 1..=3u32 {
        let state = harness.run(&destinations[0]).await.unwrap();
        let AttemptState::RetryScheduled { delay } = state else {
            panic!("attempt {attempt} should be retried, got {state:?}");
        };

        let floor = Duration::from_secs(1 << attempt);
        assert!(delay >= floor && delay < floor + Duration::from_secs(1), "attempt {attempt}: {delay:?}");
        assert!(delay > previous_delay);
        previous_delay = delay;

        let stored = harness.queue.peek(&key).await.unwrap();
        assert_eq!(stored.attempt, attempt);
        assert!(stored.run_at > Utc::now());
        assert_eq!(harness.destination_status(&destinations[0]).await, DestinationStatus::Pending);
        assert_eq!(harness.notifier.count(NotificationKind::PostPublished), 0);
    }

    assert_eq!(harness.run(&destinations[0]).await, Some(AttemptState::Succeeded));
    assert_eq!(harness.destination_status(&destinations[0]).await, DestinationStatus::Success);
    assert_eq!(harness.post_status(post.id).await, PostStatus::Published);
    assert_eq!(harness.notifier.count(NotificationKind::PostPublished), 1);
    assert_eq!(harness.notifier.count(NotificationKind::PostFailed), 0);

    let attempts: Vec<_> = harness
        .store
        .list_logs(post.id)
        .await
        .unwrap()
        .iter()
        .map(|l| (l.attempt, l.status))
        .collect();
    assert_eq!(
        attempts,
        vec![
            (1, AttemptStatus::Failed),
            (2, AttemptStatus::Failed),
            (3, AttemptStatus::Failed),
            (4, AttemptStatus::Success),
        ]
    );
}

#[tokio::test]
async fn test_partial_success_publishes_post() {
    let twitter = ScriptedAdapter::new(Platform::Twitter, vec![Ok("tw-1".into())]);
    let linkedin = ScriptedAdapter::new(Platform::Linkedin, (0..10).map(|_| upstream_500()).collect());
    let harness = Harness::new(&[twitter.clone(), linkedin.clone()]);
    let (post, destinations) = harness
        .seed_post("Big news", &[Platform::Twitter, Platform::Linkedin])
        .await;
    harness.runner.schedule_post(post.id).await.unwrap();
    let (tw, li) = (&destinations[0], &destinations[1]);

    assert_eq!(harness.run(tw).await, Some(AttemptState::Succeeded));
    // One destination still pending: the post is not settled yet.
    assert_eq!(harness.post_status(post.id).await, PostStatus::Publishing);

    let mut states = Vec::new();
    while let Some(state) = harness.run(li).await {
        states.push(state);
    }

    assert_eq!(states.len(), 5);
    assert_eq!(states.last(), Some(&AttemptState::TerminallyFailed));
    assert_eq!(linkedin.calls().len(), 5);

    let li_row = harness.store.get_destination(li.id).await.unwrap().unwrap();
    assert_eq!(li_row.status, DestinationStatus::Failed);
    assert!(li_row.error_message.unwrap().contains("Internal Server Error"));
    assert_eq!(harness.post_status(post.id).await, PostStatus::Published);
    assert_eq!(harness.notifier.count(NotificationKind::PostPublished), 1);
}

#[tokio::test]
async fn test_deleted_post_aborts_quietly() {
    let twitter = ScriptedAdapter::new(Platform::Twitter, vec![]);
    let harness = Harness::new(&[twitter.clone()]);
    let (post, destinations) = harness.seed_post("Gone soon", &[Platform::Twitter]).await;
    harness.runner.schedule_post(post.id).await.unwrap();

    harness.store.delete_post(post.id).await;

    assert_eq!(harness.run(&destinations[0]).await, Some(AttemptState::Aborted));
    assert!(twitter.calls().is_empty());
    assert!(harness.notifier.sent.lock().unwrap().is_empty());
    assert_eq!(harness.queue.stats().await.unwrap().pending, 0);
}

#[tokio::test]
async fn test_missing_adapter_is_terminal() {
    let harness = Harness::new(&[]);
    let (post, destinations) = harness.seed_post("Hello", &[Platform::Tiktok]).await;
    harness.runner.schedule_post(post.id).await.unwrap();

    assert_eq!(
        harness.run(&destinations[0]).await,
        Some(AttemptState::TerminallyFailed)
    );
    let logs = harness.store.list_logs(post.id).await.unwrap();
    assert_eq!(logs[0].error_code.as_deref(), Some("unsupported_platform"));
}

#[tokio::test]
async fn test_scheduling_twice_keeps_one_job() {
    let harness = Harness::new(&[]);
    let (post, _) = harness.seed_post("Hello", &[Platform::Twitter]).await;

    harness.runner.schedule_post(post.id).await.unwrap();
    let again = harness.runner.schedule_post(post.id).await.unwrap();

    assert_eq!(again, vec![EnqueueOutcome::Updated]);
    assert_eq!(harness.queue.stats().await.unwrap().pending, 1);
}

#[tokio::test]
async fn test_trigger_runs_now_and_reports_settled() {
    let twitter = ScriptedAdapter::new(Platform::Twitter, vec![Ok("123".into())]);
    let harness = Harness::new(&[twitter.clone()]);
    let (post, destinations) = harness.seed_post("Now please", &[Platform::Twitter]).await;

    let reports = harness.runner.trigger_post(post.id, "manual").await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].destination_id, destinations[0].id);
    assert_eq!(
        reports[0].result,
        TriggerResult::Attempted {
            attempt: AttemptState::Succeeded
        }
    );

    let again = harness.runner.trigger_post(post.id, "manual").await.unwrap();
    assert_eq!(
        again[0].result,
        TriggerResult::AlreadySettled {
            status: DestinationStatus::Success
        }
    );
    assert_eq!(twitter.calls().len(), 1);
    assert_eq!(harness.notifier.count(NotificationKind::PostPublished), 1);
}

#[tokio::test]
async fn test_trigger_skips_job_held_by_worker() {
    let harness = Harness::new(&[]);
    let (post, _) = harness.seed_post("Busy", &[Platform::Twitter]).await;
    harness.runner.schedule_post(post.id).await.unwrap();
    let _held = harness.queue.claim_next("pool-worker").await.unwrap().unwrap();

    let reports = harness.runner.trigger_post(post.id, "manual").await.unwrap();
    assert_eq!(reports[0].result, TriggerResult::InFlight);
}

#[tokio::test]
async fn test_worker_pool_drains_queue() {
    let twitter = ScriptedAdapter::new(Platform::Twitter, vec![]);
    let harness = Harness::new(&[twitter.clone()]);
    let mut posts = Vec::new();
    for i in 0..5 {
        let (post, _) = harness.seed_post(&format!("post {i}"), &[Platform::Twitter]).await;
        harness.runner.schedule_post(post.id).await.unwrap();
        posts.push(post.id);
    }

    let pool = WorkerPool::new(
        harness.runner.clone(),
        WorkerPoolConfig {
            workers: 3,
            poll_interval: Duration::from_millis(10),
            worker_prefix: "test".into(),
        },
    )
    .start();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let mut published = 0;
        for id in &posts {
            if harness.post_status(*id).await == PostStatus::Published {
                published += 1;
            }
        }
        if published == posts.len() || tokio::time::Instant::now() > deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    pool.shutdown().await;

    for id in &posts {
        assert_eq!(harness.post_status(*id).await, PostStatus::Published);
    }
    // Each job dispatched exactly once.
    assert_eq!(twitter.calls().len(), posts.len());
    assert_eq!(harness.notifier.count(NotificationKind::PostPublished), posts.len());
}

#[tokio::test]
async fn test_abandoned_claims_exhaust_attempts() {
    let twitter = ScriptedAdapter::new(Platform::Twitter, vec![]);
    let harness = Harness::build(
        vec![twitter.clone()],
        InMemoryJobQueueConfig {
            lease_duration: Duration::from_millis(100),
        },
        |dispatcher| dispatcher,
    );
    let (post, destinations) = harness.seed_post("Crashy", &[Platform::Twitter]).await;
    harness.runner.schedule_post(post.id).await.unwrap();

    // Five workers claim the job and die before settling it.
    for expected in 1..=5u32 {
        let claimed = harness.queue.claim_next("doomed").await.unwrap().unwrap();
        assert_eq!(claimed.job.attempt, expected);
        tokio::time::sleep(Duration::from_millis(120)).await;
    }

    let claimed = harness.queue.claim_next("survivor").await.unwrap().unwrap();
    assert_eq!(claimed.job.attempt, 6);
    assert_eq!(
        harness.runner.run_claimed(claimed).await.unwrap(),
        AttemptState::TerminallyFailed
    );

    assert!(twitter.calls().is_empty());
    assert_eq!(harness.destination_status(&destinations[0]).await, DestinationStatus::Failed);
    assert_eq!(harness.post_status(post.id).await, PostStatus::Failed);
    assert_eq!(harness.notifier.count(NotificationKind::PostFailed), 1);
    assert_eq!(harness.queue.stats().await.unwrap().pending, 0);

    let logs = harness.store.list_logs(post.id).await.unwrap();
    assert_eq!(logs.last().unwrap().error_code.as_deref(), Some("attempts_exhausted"));
}

#[tokio::test]
async fn test_panicking_adapter_does_not_kill_worker() {
    let panicking = Arc::new(PanickingAdapter::default());
    let linkedin = ScriptedAdapter::new(Platform::Linkedin, vec![Ok("li-1".into())]);
    let harness = Harness::build(
        vec![panicking.clone() as Arc<dyn PlatformAdapter>, linkedin.clone()],
        InMemoryJobQueueConfig::default(),
        |dispatcher| dispatcher,
    );

    let (broken, broken_destinations) = harness.seed_post("Boom", &[Platform::Twitter]).await;
    harness.runner.schedule_post(broken.id).await.unwrap();
    let (healthy, _) = harness.seed_post("Fine", &[Platform::Linkedin]).await;
    harness.runner.schedule_post(healthy.id).await.unwrap();

    let pool = WorkerPool::new(
        harness.runner.clone(),
        WorkerPoolConfig {
            workers: 1,
            poll_interval: Duration::from_millis(10),
            worker_prefix: "solo".into(),
        },
    )
    .start();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while harness.post_status(healthy.id).await != PostStatus::Published
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    pool.shutdown().await;

    assert_eq!(harness.post_status(healthy.id).await, PostStatus::Published);
    assert_eq!(linkedin.calls().len(), 1);
    assert_eq!(panicking.calls.load(Ordering::SeqCst), 1);

    // The panic cost one attempt and the job waits out its backoff.
    let key = PublishJob::dedup_key(broken.id, broken_destinations[0].account_id);
    let stored = harness.queue.peek(&key).await.unwrap();
    assert_eq!(stored.attempt, 1);
    assert!(stored.run_at > Utc::now());
    assert_eq!(harness.queue.stats().await.unwrap().processing, 0);
}

#[tokio::test]
async fn test_slow_adapter_times_out_and_retries() {
    let harness = Harness::build(
        vec![Arc::new(SlowAdapter {
            delay: Duration::from_millis(500),
        })],
        InMemoryJobQueueConfig::default(),
        |dispatcher| dispatcher.with_adapter_timeout(Duration::from_millis(50)),
    );
    let (post, destinations) = harness.seed_post("Slow", &[Platform::Twitter]).await;
    harness.runner.schedule_post(post.id).await.unwrap();

    let state = harness.run(&destinations[0]).await.unwrap();
    assert!(matches!(state, AttemptState::RetryScheduled { .. }), "{state:?}");

    let logs = harness.store.list_logs(post.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error_code.as_deref(), Some("timeout"));
    assert_eq!(harness.destination_status(&destinations[0]).await, DestinationStatus::Pending);
}

#[tokio::test]
async fn test_platform_timeout_overrides_default() {
    let harness = Harness::build(
        vec![Arc::new(SlowAdapter {
            delay: Duration::from_millis(100),
        })],
        InMemoryJobQueueConfig::default(),
        |dispatcher| {
            dispatcher
                .with_adapter_timeout(Duration::from_millis(20))
                .with_platform_timeout(Platform::Twitter, Duration::from_secs(2))
        },
    );
    let (post, destinations) = harness.seed_post("Video", &[Platform::Twitter]).await;
    harness.runner.schedule_post(post.id).await.unwrap();

    assert_eq!(harness.run(&destinations[0]).await, Some(AttemptState::Succeeded));
    assert_eq!(harness.destination_status(&destinations[0]).await, DestinationStatus::Success);
}

#[tokio::test]
async fn test_redelivered_job_replays_settled_destination() {
    let twitter = ScriptedAdapter::new(Platform::Twitter, vec![Ok("123".into())]);
    let harness = Harness::new(&[twitter.clone()]);
    let (post, destinations) = harness.seed_post("Once", &[Platform::Twitter]).await;
    harness.runner.schedule_post(post.id).await.unwrap();
    assert_eq!(harness.run(&destinations[0]).await, Some(AttemptState::Succeeded));

    // A duplicate delivery of the same destination.
    let job = PublishJob::new(PublishPayload {
        post_id: post.id,
        account_id: destinations[0].account_id,
        destination_id: destinations[0].id,
    });
    assert_eq!(
        harness.queue.enqueue(job, Duration::ZERO).await.unwrap(),
        EnqueueOutcome::Inserted
    );

    assert_eq!(harness.run(&destinations[0]).await, Some(AttemptState::Succeeded));
    assert_eq!(twitter.calls().len(), 1);
    assert_eq!(harness.notifier.count(NotificationKind::PostPublished), 1);
    assert_eq!(harness.store.list_logs(post.id).await.unwrap().len(), 1);
    assert_eq!(harness.queue.stats().await.unwrap().pending, 0);
}

#[tokio::test]
async fn test_store_errors_retry_then_fail_terminally() {
    let twitter = ScriptedAdapter::new(Platform::Twitter, vec![]);
    let harness = Harness::new(&[twitter.clone()]);
    let (post, destinations) = harness.seed_post("Flaky db", &[Platform::Twitter]).await;

    let flaky = Arc::new(FlakyPostStore {
        inner: harness.store.clone(),
        broken: AtomicBool::new(true),
    });
    let dispatcher = Dispatcher::new(
        flaky.clone(),
        harness.store.clone(),
        Arc::new(PlaintextCipher),
        AdapterRegistry::new().with(twitter.clone()),
        RetryPolicy::new(3, Duration::from_secs(300)),
    );
    let runner = PublishRunner::new(
        harness.queue.clone(),
        flaky.clone(),
        Arc::new(dispatcher),
        harness.notifier.clone(),
    );
    runner.schedule_post(post.id).await.unwrap();
    let key = PublishJob::dedup_key(post.id, destinations[0].account_id);

    let mut states = Vec::new();
    while let Some(claimed) = harness.queue.claim(&key, "w1").await.unwrap() {
        states.push(runner.run_claimed(claimed).await.unwrap());
    }

    assert_eq!(states.len(), 3);
    assert!(matches!(states[0], AttemptState::RetryScheduled { .. }));
    assert!(matches!(states[1], AttemptState::RetryScheduled { .. }));
    assert_eq!(states[2], AttemptState::TerminallyFailed);
    assert!(twitter.calls().is_empty());

    let destination = harness.store.get_destination(destinations[0].id).await.unwrap().unwrap();
    assert_eq!(destination.status, DestinationStatus::Failed);
    assert!(destination.error_message.unwrap().contains("connection reset"));
    assert_eq!(harness.post_status(post.id).await, PostStatus::Failed);
    assert_eq!(harness.notifier.count(NotificationKind::PostFailed), 1);

    let logs = harness.store.list_logs(post.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error_code.as_deref(), Some("store_error"));
    assert_eq!(logs[0].attempt, 3);
}

#[tokio::test]
async fn test_permit_taken_before_claim() {
    let twitter = ScriptedAdapter::new(Platform::Twitter, vec![]);
    let harness = Harness::new(&[twitter.clone()]);
    let limiter = Arc::new(LeaseObservingLimiter {
        queue: harness.queue.clone(),
        leased_while_waiting: Mutex::new(Vec::new()),
    });
    let dispatcher = Dispatcher::new(
        harness.store.clone(),
        harness.store.clone(),
        Arc::new(PlaintextCipher),
        AdapterRegistry::new().with(twitter.clone()),
        RetryPolicy::default(),
    );
    let runner = Arc::new(
        PublishRunner::new(
            harness.queue.clone(),
            harness.store.clone(),
            Arc::new(dispatcher),
            harness.notifier.clone(),
        )
        .with_rate_limiter(limiter.clone()),
    );

    let (triggered, _) = harness.seed_post("Manual", &[Platform::Twitter]).await;
    let reports = runner.trigger_post(triggered.id, "manual").await.unwrap();
    assert_eq!(
        reports[0].result,
        TriggerResult::Attempted {
            attempt: AttemptState::Succeeded
        }
    );

    let (pooled, _) = harness.seed_post("Pooled", &[Platform::Twitter]).await;
    runner.schedule_post(pooled.id).await.unwrap();
    let pool = WorkerPool::new(
        runner.clone(),
        WorkerPoolConfig {
            workers: 1,
            poll_interval: Duration::from_millis(10),
            worker_prefix: "limited".into(),
        },
    )
    .start();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while harness.post_status(pooled.id).await != PostStatus::Published
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    pool.shutdown().await;

    assert_eq!(harness.post_status(pooled.id).await, PostStatus::Published);
    assert_eq!(twitter.calls().len(), 2);
    let observed = limiter.leased_while_waiting.lock().unwrap().clone();
    assert!(observed.len() >= 2, "{observed:?}");
    // No lease was ever held while a permit was awaited.
    assert!(observed.iter().all(|leased| *leased == 0), "{observed:?}");
}
