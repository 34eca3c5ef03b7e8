use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of deferred work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// `job:<type>:<uuid v7>`; unique and time-ordered.
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: Value,
    /// Unix milliseconds.
    pub created_at: i64,
    pub status: JobStatus,
    /// Incremented on every dequeue.
    pub attempts: u32,
    pub max_attempts: u32,
    /// Unix milliseconds of the latest dequeue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
}

impl Job {
    pub fn new(job_type: &str, payload: Value, max_attempts: u32) -> Self {
        Self {
            id: format!("job:{}:{}", job_type, Uuid::now_v7()),
            job_type: job_type.to_string(),
            payload,
            created_at: Utc::now().timestamp_millis(),
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            started_at: None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub(crate) fn mark_processing(&mut self) {
        self.attempts += 1;
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now().timestamp_millis());
    }

    pub(crate) fn mark_pending(&mut self) {
        self.status = JobStatus::Pending;
        self.started_at = None;
    }

    pub(crate) fn into_failed(mut self, error: &str) -> FailedJob {
        self.status = JobStatus::Failed;
        FailedJob {
            job: self,
            error: error.to_string(),
            failed_at: Utc::now().timestamp_millis(),
        }
    }

    /// Whether the job has been processing since before `cutoff_ms`.
    pub(crate) fn started_before(&self, cutoff_ms: i64) -> bool {
        self.status == JobStatus::Processing && self.started_at.is_some_and(|t| t < cutoff_ms)
    }
}

/// Failed-ledger entry: the job as last seen plus the final error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedJob {
    #[serde(flatten)]
    pub job: Job,
    pub error: String,
    /// Unix milliseconds.
    pub failed_at: i64,
}

/// What `fail` did with the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Re-appended to the pending partition.
    Retrying { attempts: u32 },
    /// Moved to the failed ledger.
    Exhausted { attempts: u32 },
    /// The job was not in the processing partition.
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}
