use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{JobQueue, STALE_ERROR};
use crate::error::MqError;
use crate::job::{FailOutcome, FailedJob, Job, QueueStats};

#[derive(Default)]
struct State {
    /// Front is the oldest job.
    pending: VecDeque<String>,
    processing: Vec<String>,
    jobs: HashMap<String, Job>,
    completed: VecDeque<String>,
    completed_count: u64,
    failed: VecDeque<FailedJob>,
}

impl State {
    fn take_processing(&mut self, job_id: &str) -> Option<Job> {
        let pos = self.processing.iter().position(|id| id == job_id)?;
        self.processing.remove(pos);
        self.jobs.remove(job_id)
    }

    fn push_failed(&mut self, entry: FailedJob, limit: usize) {
        self.failed.push_front(entry);
        self.failed.truncate(limit);
    }

    /// Requeue or fail a processing job.
    fn retry_or_fail(&mut self, job_id: &str, error: &str, limit: usize) -> FailOutcome {
        let Some(mut job) = self.take_processing(job_id) else {
            return FailOutcome::Unknown;
        };
        let attempts = job.attempts;
        if job.is_exhausted() {
            self.push_failed(job.into_failed(error), limit);
            FailOutcome::Exhausted { attempts }
        } else {
            job.mark_pending();
            self.pending.push_back(job.id.clone());
            self.jobs.insert(job.id.clone(), job);
            FailOutcome::Retrying { attempts }
        }
    }
}

/// In-process job queue with the same partitions and retry semantics as
/// [`RedisJobQueue`](super::RedisJobQueue). Used by tests and single-node setups.
pub struct MemoryJobQueue {
    name: String,
    default_max_attempts: u32,
    ledger_limit: usize,
    state: Mutex<State>,
}

impl MemoryJobQueue {
    pub fn new(name: impl Into<String>, default_max_attempts: u32) -> Self {
        Self {
            name: name.into(),
            default_max_attempts,
            ledger_limit: 1000,
            state: Mutex::new(State::default()),
        }
    }

    /// Jobs currently pending, oldest first. Does not modify the queue.
    pub async fn pending_jobs(&self) -> Vec<Job> {
        let state = self.state.lock().await;
        state
            .pending
            .iter()
            .filter_map(|id| state.jobs.get(id).cloned())
            .collect()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(
        &self,
        job_type: &str,
        payload: Value,
        max_attempts: Option<u32>,
    ) -> Result<String, MqError> {
        let job = Job::new(
            job_type,
            payload,
            max_attempts.unwrap_or(self.default_max_attempts),
        );
        let id = job.id.clone();

        let mut state = self.state.lock().await;
        state.pending.push_back(id.clone());
        state.jobs.insert(id.clone(), job);
        Ok(id)
    }

    async fn dequeue(&self) -> Result<Option<Job>, MqError> {
        let mut state = self.state.lock().await;
        while let Some(id) = state.pending.pop_front() {
            if let Some(job) = state.jobs.get_mut(&id) {
                job.mark_processing();
                let job = job.clone();
                state.processing.push(id);
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    async fn complete(&self, job_id: &str) -> Result<(), MqError> {
        let mut state = self.state.lock().await;
        if state.take_processing(job_id).is_some() {
            state.completed.push_front(job_id.to_string());
            state.completed.truncate(self.ledger_limit);
            state.completed_count += 1;
        }
        Ok(())
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<FailOutcome, MqError> {
        let mut state = self.state.lock().await;
        Ok(state.retry_or_fail(job_id, error, self.ledger_limit))
    }

    async fn fail_permanently(&self, job_id: &str, error: &str) -> Result<(), MqError> {
        let mut state = self.state.lock().await;
        if let Some(job) = state.take_processing(job_id) {
            state.push_failed(job.into_failed(error), self.ledger_limit);
        }
        Ok(())
    }

    async fn queue_length(&self) -> Result<u64, MqError> {
        Ok(self.state.lock().await.pending.len() as u64)
    }

    async fn processing_length(&self) -> Result<u64, MqError> {
        Ok(self.state.lock().await.processing.len() as u64)
    }

    async fn stats(&self) -> Result<QueueStats, MqError> {
        let state = self.state.lock().await;
        Ok(QueueStats {
            pending: state.pending.len() as u64,
            processing: state.processing.len() as u64,
            completed: state.completed_count,
            failed: state.failed.len() as u64,
        })
    }

    async fn failed_jobs(&self, limit: usize) -> Result<Vec<FailedJob>, MqError> {
        let state = self.state.lock().await;
        Ok(state.failed.iter().take(limit).cloned().collect())
    }

    async fn requeue_stale(&self, older_than: Duration) -> Result<usize, MqError> {
        let cutoff = Utc::now().timestamp_millis() - older_than.as_millis() as i64;

        let mut state = self.state.lock().await;
        let stale: Vec<String> = state
            .processing
            .iter()
            .filter(|id| state.jobs.get(*id).is_some_and(|job| job.started_before(cutoff)))
            .cloned()
            .collect();

        for id in &stale {
            state.retry_or_fail(id, STALE_ERROR, self.ledger_limit);
        }
        Ok(stale.len())
    }
}
