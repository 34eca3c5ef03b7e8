mod memory;
mod redis;

pub use self::memory::MemoryJobQueue;
pub use self::redis::RedisJobQueue;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::MqError;
use crate::job::{FailOutcome, FailedJob, Job, QueueStats};

/// A named FIFO work queue with a processing partition and retry accounting.
///
/// Delivery is at-least-once: a consumer that crashes between `dequeue` and
/// `complete`/`fail` leaves the job in the processing partition until
/// `requeue_stale` returns it.
#[async_trait]
pub trait JobQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Append a job to the pending partition and return its id.
    /// `max_attempts` falls back to the queue default when `None`.
    async fn enqueue(
        &self,
        job_type: &str,
        payload: Value,
        max_attempts: Option<u32>,
    ) -> Result<String, MqError>;

    /// Atomically move the oldest pending job into processing and bump its attempts.
    async fn dequeue(&self) -> Result<Option<Job>, MqError>;

    /// Remove a job from processing and record it in the completed ledger.
    async fn complete(&self, job_id: &str) -> Result<(), MqError>;

    /// Retry the job at the tail of the queue, or move it to the failed ledger
    /// once its attempts are exhausted.
    async fn fail(&self, job_id: &str, error: &str) -> Result<FailOutcome, MqError>;

    /// Move a job straight to the failed ledger regardless of remaining attempts.
    async fn fail_permanently(&self, job_id: &str, error: &str) -> Result<(), MqError>;

    async fn queue_length(&self) -> Result<u64, MqError>;

    async fn processing_length(&self) -> Result<u64, MqError>;

    async fn stats(&self) -> Result<QueueStats, MqError>;

    /// Most recent failed-ledger entries, newest first.
    async fn failed_jobs(&self, limit: usize) -> Result<Vec<FailedJob>, MqError>;

    /// Return jobs that have been processing longer than `older_than` to the
    /// pending partition (or the failed ledger when exhausted).
    async fn requeue_stale(&self, older_than: Duration) -> Result<usize, MqError>;
}

/// Extension trait for typed payloads.
/// Automatically implemented for any T that implements JobQueue.
#[async_trait]
pub trait JobQueueExt: JobQueue {
    async fn enqueue_json<T>(&self, job_type: &str, payload: &T) -> Result<String, MqError>
    where
        T: Serialize + Send + Sync,
    {
        let value = serde_json::to_value(payload)?;
        self.enqueue(job_type, value, None).await
    }
}

// Blanket implementation
impl<T: ?Sized + JobQueue> JobQueueExt for T {}

pub(crate) const STALE_ERROR: &str = "processing timed out";

pub(crate) fn pending_key(name: &str) -> String {
    format!("queue:{name}")
}
pub(crate) fn processing_key(name: &str) -> String {
    format!("queue:{name}:processing")
}
pub(crate) fn jobs_key(name: &str) -> String {
    format!("queue:{name}:jobs")
}
pub(crate) fn completed_key(name: &str) -> String {
    format!("queue:{name}:completed")
}
pub(crate) fn completed_count_key(name: &str) -> String {
    format!("queue:{name}:completed_count")
}
pub(crate) fn failed_key(name: &str) -> String {
    format!("queue:{name}:failed")
}
