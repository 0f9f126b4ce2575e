//! Job queue implementations and the worker pool that drains them.

mod memory;
mod worker;

pub use memory::{InMemoryJobQueue, InMemoryJobQueueConfig};
pub use worker::{WorkerPool, WorkerPoolConfig, WorkerPoolHandle};

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisJobQueue, RedisJobQueueConfig};

#[cfg(test)]
mod tests;
