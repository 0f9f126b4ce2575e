//! Redis job queue implementation.
//!
//! Layout under the queue namespace:
//! - `{ns}:jobs`     HASH  dedup key -> job JSON
//! - `{ns}:schedule` ZSET  dedup key scored by `run_at` (ms)
//! - `{ns}:leases`   ZSET  dedup key scored by lease expiry (ms)
//! - `{ns}:tokens`   HASH  dedup key -> lease token
//!
//! Every operation is a Lua script so claim/requeue/complete stay atomic per key
//! across processes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use uuid::Uuid;

use herald_core::ports::{
    ClaimedJob, EnqueueOutcome, JobQueue, JobQueueError, Lease, PublishJob, QueueStats,
    run_at_after,
};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }
}

/// Redis job queue configuration.
#[derive(Debug, Clone)]
pub struct RedisJobQueueConfig {
    /// Redis connection config
    pub redis: RedisConfig,
    /// Key namespace
    pub queue_name: String,
    /// How long a claim stays exclusive
    pub lease_duration: Duration,
}

impl Default for RedisJobQueueConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            queue_name: "publish".to_string(),
            lease_duration: Duration::from_secs(120),
        }
    }
}

impl RedisJobQueueConfig {
    pub fn from_env() -> Self {
        Self {
            redis: RedisConfig::from_env(),
            queue_name: std::env::var("PUBLISH_QUEUE_NAME")
                .unwrap_or_else(|_| "publish".to_string()),
            lease_duration: Duration::from_secs(
                std::env::var("PUBLISH_LEASE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        }
    }
}

// KEYS: jobs, schedule, leases, tokens. ARGV: key, job json, run_at ms, now ms.
// Returns 0 inserted, 1 updated, 2 in flight.
const ENQUEUE: &str = r#"
local lease = redis.call('ZSCORE', KEYS[3], ARGV[1])
if lease and tonumber(lease) > tonumber(ARGV[4]) then
    return 2
end
local existing = redis.call('HGET', KEYS[1], ARGV[1])
local job = ARGV[2]
if existing then
    local stored = cjson.decode(existing)
    local incoming = cjson.decode(job)
    incoming['attempt'] = stored['attempt']
    incoming['created_at'] = stored['created_at']
    job = cjson.encode(incoming)
end
redis.call('ZREM', KEYS[3], ARGV[1])
redis.call('HDEL', KEYS[4], ARGV[1])
redis.call('HSET', KEYS[1], ARGV[1], job)
redis.call('ZADD', KEYS[2], ARGV[3], ARGV[1])
if existing then
    return 1
end
return 0
"#;

// KEYS: jobs, schedule, leases, tokens. ARGV: now ms, lease expiry ms, token, key ('' = earliest due).
const CLAIM: &str = r#"
local expired = redis.call('ZRANGEBYSCORE', KEYS[3], '-inf', ARGV[1])
for _, k in ipairs(expired) do
    redis.call('ZREM', KEYS[3], k)
    redis.call('HDEL', KEYS[4], k)
    if redis.call('HEXISTS', KEYS[1], k) == 1 then
        redis.call('ZADD', KEYS[2], ARGV[1], k)
    end
end
local key = ARGV[4]
if key == '' then
    local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1], 'LIMIT', 0, 1)
    if #due == 0 then
        return false
    end
    key = due[1]
elseif not redis.call('ZSCORE', KEYS[2], key) then
    return false
end
local job = cjson.decode(redis.call('HGET', KEYS[1], key))
job['attempt'] = job['attempt'] + 1
local encoded = cjson.encode(job)
redis.call('HSET', KEYS[1], key, encoded)
redis.call('ZREM', KEYS[2], key)
redis.call('ZADD', KEYS[3], ARGV[2], key)
redis.call('HSET', KEYS[4], key, ARGV[3])
return encoded
"#;

// KEYS: jobs, schedule, leases, tokens. ARGV: key, token, job json, run_at ms.
const REQUEUE: &str = r#"
if redis.call('HGET', KEYS[4], ARGV[1]) ~= ARGV[2] then
    return 0
end
redis.call('HDEL', KEYS[4], ARGV[1])
redis.call('ZREM', KEYS[3], ARGV[1])
redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
redis.call('ZADD', KEYS[2], ARGV[4], ARGV[1])
return 1
"#;

// KEYS: jobs, schedule, leases, tokens. ARGV: key, token.
const COMPLETE: &str = r#"
if redis.call('HGET', KEYS[4], ARGV[1]) ~= ARGV[2] then
    return 0
end
redis.call('HDEL', KEYS[4], ARGV[1])
redis.call('ZREM', KEYS[3], ARGV[1])
redis.call('ZREM', KEYS[2], ARGV[1])
redis.call('HDEL', KEYS[1], ARGV[1])
return 1
"#;

/// Redis-backed job queue with leased claims.
pub struct RedisJobQueue {
    conn: ConnectionManager,
    config: RedisJobQueueConfig,
    enqueue_script: Script,
    claim_script: Script,
    requeue_script: Script,
    complete_script: Script,
    completed: AtomicUsize,
    requeued: AtomicUsize,
}

impl RedisJobQueue {
    pub async fn new(config: RedisJobQueueConfig) -> Result<Self, JobQueueError> {
        let client = Client::open(config.redis.url.as_str())
            .map_err(|e| JobQueueError::Backend(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn = tokio::time::timeout(config.redis.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| JobQueueError::Backend("Connection timed out".to_string()))?
            .map_err(|e| JobQueueError::Backend(e.to_string()))?;

        tracing::info!(
            url = %config.redis.url,
            queue = %config.queue_name,
            lease_secs = config.lease_duration.as_secs(),
            "Connected to Redis job queue"
        );

        Ok(Self {
            conn,
            config,
            enqueue_script: Script::new(ENQUEUE),
            claim_script: Script::new(CLAIM),
            requeue_script: Script::new(REQUEUE),
            complete_script: Script::new(COMPLETE),
            completed: AtomicUsize::new(0),
            requeued: AtomicUsize::new(0),
        })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, JobQueueError> {
        Self::new(RedisJobQueueConfig::from_env()).await
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.config.queue_name, suffix)
    }

    async fn claim_inner(
        &self,
        key: &str,
        worker_id: &str,
    ) -> Result<Option<ClaimedJob>, JobQueueError> {
        let mut conn = self.conn.clone();
        let lease = Lease {
            worker_id: worker_id.to_string(),
            token: Uuid::new_v4(),
            expires_at: run_at_after(self.config.lease_duration)?,
        };

        let job_json: Option<String> = self
            .claim_script
            .key(self.key("jobs"))
            .key(self.key("schedule"))
            .key(self.key("leases"))
            .key(self.key("tokens"))
            .arg(Utc::now().timestamp_millis())
            .arg(lease.expires_at.timestamp_millis())
            .arg(lease.token.to_string())
            .arg(key)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| JobQueueError::Backend(e.to_string()))?;

        let Some(job_json) = job_json else {
            return Ok(None);
        };

        let job: PublishJob = serde_json::from_str(&job_json)
            .map_err(|e| JobQueueError::Serialization(e.to_string()))?;

        Ok(Some(ClaimedJob { job, lease }))
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(
        &self,
        job: PublishJob,
        delay: Duration,
    ) -> Result<EnqueueOutcome, JobQueueError> {
        let mut conn = self.conn.clone();
        let run_at = run_at_after(delay)?;
        let job = PublishJob { run_at, ..job };
        let job_json =
            serde_json::to_string(&job).map_err(|e| JobQueueError::Serialization(e.to_string()))?;

        let code: i64 = self
            .enqueue_script
            .key(self.key("jobs"))
            .key(self.key("schedule"))
            .key(self.key("leases"))
            .key(self.key("tokens"))
            .arg(&job.key)
            .arg(&job_json)
            .arg(run_at.timestamp_millis())
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| JobQueueError::Backend(e.to_string()))?;

        let outcome = match code {
            0 => EnqueueOutcome::Inserted,
            1 => EnqueueOutcome::Updated,
            _ => EnqueueOutcome::InFlight,
        };
        tracing::debug!(job_key = %job.key, outcome = ?outcome, "Job enqueued");
        Ok(outcome)
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<ClaimedJob>, JobQueueError> {
        self.claim_inner("", worker_id).await
    }

    async fn claim(
        &self,
        key: &str,
        worker_id: &str,
    ) -> Result<Option<ClaimedJob>, JobQueueError> {
        self.claim_inner(key, worker_id).await
    }

    async fn requeue(&self, claimed: ClaimedJob, delay: Duration) -> Result<(), JobQueueError> {
        let mut conn = self.conn.clone();
        let run_at = run_at_after(delay)?;
        let job = PublishJob {
            run_at,
            ..claimed.job
        };
        let job_json =
            serde_json::to_string(&job).map_err(|e| JobQueueError::Serialization(e.to_string()))?;

        let ok: i64 = self
            .requeue_script
            .key(self.key("jobs"))
            .key(self.key("schedule"))
            .key(self.key("leases"))
            .key(self.key("tokens"))
            .arg(&job.key)
            .arg(claimed.lease.token.to_string())
            .arg(&job_json)
            .arg(run_at.timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| JobQueueError::Backend(e.to_string()))?;

        if ok == 0 {
            return Err(JobQueueError::LeaseLost(job.key));
        }

        self.requeued.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(job_key = %job.key, attempt = job.attempt, "Job requeued");
        Ok(())
    }

    async fn complete(&self, claimed: ClaimedJob) -> Result<(), JobQueueError> {
        let mut conn = self.conn.clone();

        let ok: i64 = self
            .complete_script
            .key(self.key("jobs"))
            .key(self.key("schedule"))
            .key(self.key("leases"))
            .key(self.key("tokens"))
            .arg(&claimed.job.key)
            .arg(claimed.lease.token.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| JobQueueError::Backend(e.to_string()))?;

        if ok == 0 {
            return Err(JobQueueError::LeaseLost(claimed.job.key));
        }

        self.completed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, JobQueueError> {
        let mut conn = self.conn.clone();
        let (pending, processing): (usize, usize) = redis::pipe()
            .zcard(self.key("schedule"))
            .zcard(self.key("leases"))
            .query_async(&mut conn)
            .await
            .map_err(|e| JobQueueError::Backend(e.to_string()))?;

        Ok(QueueStats {
            pending,
            processing,
            completed: self.completed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
        })
    }
}
