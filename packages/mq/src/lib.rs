pub mod error;
pub mod job;
pub mod kv;
pub mod queue;

pub use error::MqError;
pub use job::{FailOutcome, FailedJob, Job, JobStatus, QueueStats};
pub use kv::{KvStore, MemoryKv, RedisKv};
pub use queue::{JobQueue, JobQueueExt, MemoryJobQueue, RedisJobQueue};

use redis::aio::MultiplexedConnection;

/// Redis connection shared by every queue and key-value handle in a process.
pub type RedisConnection = MultiplexedConnection;

/// Open a multiplexed Redis connection.
pub async fn connect(url: &str) -> Result<RedisConnection, MqError> {
    let client = redis::Client::open(url)?;
    let conn = client.get_multiplexed_async_connection().await?;
    Ok(conn)
}
