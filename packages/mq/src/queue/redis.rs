use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::Script;
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    JobQueue, STALE_ERROR, completed_count_key, completed_key, failed_key, jobs_key, pending_key,
    processing_key,
};
use crate::error::MqError;
use crate::job::{FailOutcome, FailedJob, Job, JobStatus, QueueStats};

// Scripts keep every partition change and its body update in one step, so a
// crashed consumer never leaves an id in processing with a pending body.

/// KEYS: pending, processing, jobs. ARGV: now (unix ms).
/// Returns nil when empty, `{id}` without a body, `{id, raw}` when the body is
/// unreadable, `{id, raw, body}` after marking it processing.
const DEQUEUE: &str = r"
local id = redis.call('LMOVE', KEYS[1], KEYS[2], 'RIGHT', 'LEFT')
if not id then
  return false
end
local raw = redis.call('HGET', KEYS[3], id)
if not raw then
  return {id}
end
local ok, job = pcall(cjson.decode, raw)
if not ok or type(job) ~= 'table' then
  return {id, raw}
end
job['status'] = 'processing'
job['attempts'] = (tonumber(job['attempts']) or 0) + 1
job['started_at'] = tonumber(ARGV[1])
local body = cjson.encode(job)
redis.call('HSET', KEYS[3], id, body)
return {id, raw, body}
";

/// KEYS: processing, pending, jobs. ARGV: id.
/// Back to the pending head only if the id was still processing.
const RETRY: &str = r"
if redis.call('LREM', KEYS[1], 0, ARGV[1]) == 0 then
  return 0
end
local raw = redis.call('HGET', KEYS[3], ARGV[1])
if raw then
  local ok, job = pcall(cjson.decode, raw)
  if ok and type(job) == 'table' then
    job['status'] = 'pending'
    job['started_at'] = nil
    redis.call('HSET', KEYS[3], ARGV[1], cjson.encode(job))
  end
end
redis.call('LPUSH', KEYS[2], ARGV[1])
return 1
";

/// KEYS: processing, jobs, failed. ARGV: id, ledger entry, last ledger index.
const FAIL: &str = r"
if redis.call('LREM', KEYS[1], 0, ARGV[1]) == 0 then
  return 0
end
redis.call('HDEL', KEYS[2], ARGV[1])
redis.call('LPUSH', KEYS[3], ARGV[2])
redis.call('LTRIM', KEYS[3], 0, tonumber(ARGV[3]))
return 1
";

/// KEYS: processing, jobs, completed, completed_count. ARGV: id, last ledger index.
const COMPLETE: &str = r"
if redis.call('LREM', KEYS[1], 0, ARGV[1]) == 0 then
  return 0
end
redis.call('HDEL', KEYS[2], ARGV[1])
redis.call('LPUSH', KEYS[3], ARGV[1])
redis.call('LTRIM', KEYS[3], 0, tonumber(ARGV[2]))
redis.call('INCR', KEYS[4])
return 1
";

/// Stored form of a [`Job`]. The payload is kept as JSON text so the scripts
/// can rewrite the envelope without re-encoding caller data.
#[derive(Serialize, Deserialize)]
struct StoredJob {
    id: String,
    #[serde(rename = "type")]
    job_type: String,
    payload: String,
    created_at: i64,
    status: JobStatus,
    attempts: u32,
    max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<i64>,
}

fn encode_body(job: &Job) -> Result<String, MqError> {
    let stored = StoredJob {
        id: job.id.clone(),
        job_type: job.job_type.clone(),
        payload: serde_json::to_string(&job.payload)?,
        created_at: job.created_at,
        status: job.status,
        attempts: job.attempts,
        max_attempts: job.max_attempts,
        started_at: job.started_at,
    };
    Ok(serde_json::to_string(&stored)?)
}

fn decode_body(raw: &str) -> Result<Job, MqError> {
    let stored: StoredJob = serde_json::from_str(raw)?;
    Ok(Job {
        payload: serde_json::from_str(&stored.payload)?,
        id: stored.id,
        job_type: stored.job_type,
        created_at: stored.created_at,
        status: stored.status,
        attempts: stored.attempts,
        max_attempts: stored.max_attempts,
        started_at: stored.started_at,
    })
}

/// Redis-backed job queue.
///
/// Lists hold job ids; bodies live in a hash so a job can be updated in
/// place regardless of its position in a list.
pub struct RedisJobQueue {
    conn: MultiplexedConnection,
    name: String,
    default_max_attempts: u32,
    ledger_limit: usize,
    pending: String,
    processing: String,
    jobs: String,
    completed: String,
    completed_count: String,
    failed: String,
    dequeue_script: Script,
    retry_script: Script,
    fail_script: Script,
    complete_script: Script,
}

impl RedisJobQueue {
    pub fn new(
        conn: MultiplexedConnection,
        name: impl Into<String>,
        default_max_attempts: u32,
        ledger_limit: usize,
    ) -> Self {
        let name = name.into();
        Self {
            conn,
            default_max_attempts,
            ledger_limit: ledger_limit.max(1),
            pending: pending_key(&name),
            processing: processing_key(&name),
            jobs: jobs_key(&name),
            completed: completed_key(&name),
            completed_count: completed_count_key(&name),
            failed: failed_key(&name),
            dequeue_script: Script::new(DEQUEUE),
            retry_script: Script::new(RETRY),
            fail_script: Script::new(FAIL),
            complete_script: Script::new(COMPLETE),
            name,
        }
    }

    async fn load(&self, job_id: &str) -> Result<Option<Job>, MqError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("HGET")
            .arg(&self.jobs)
            .arg(job_id)
            .query_async(&mut conn)
            .await?;
        raw.as_deref().map(decode_body).transpose()
    }

    fn last_ledger_index(&self) -> i64 {
        self.ledger_limit as i64 - 1
    }

    /// Requeue a processing job at the pending head; false if it was no longer processing.
    async fn move_to_pending(&self, job_id: &str) -> Result<bool, MqError> {
        let mut conn = self.conn.clone();
        let moved: i64 = self
            .retry_script
            .key(&self.processing)
            .key(&self.pending)
            .key(&self.jobs)
            .arg(job_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(moved > 0)
    }

    /// Remove a processing job and append it to the failed ledger.
    async fn move_to_failed(&self, job: Job, error: &str) -> Result<bool, MqError> {
        let job_id = job.id.clone();
        let entry = serde_json::to_string(&job.into_failed(error))?;

        let mut conn = self.conn.clone();
        let moved: i64 = self
            .fail_script
            .key(&self.processing)
            .key(&self.jobs)
            .key(&self.failed)
            .arg(&job_id)
            .arg(entry)
            .arg(self.last_ledger_index())
            .invoke_async(&mut conn)
            .await?;
        Ok(moved > 0)
    }

    /// Drop a processing id whose body is missing or unreadable.
    async fn discard_orphan(&self, job_id: &str, raw: Option<String>) -> Result<(), MqError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("LREM")
            .arg(&self.processing)
            .arg(0)
            .arg(job_id)
            .ignore()
            .cmd("HDEL")
            .arg(&self.jobs)
            .arg(job_id)
            .ignore();
        if let Some(raw) = raw {
            pipe.cmd("LPUSH").arg(&self.failed).arg(raw).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn list_len(&self, key: &str) -> Result<u64, MqError> {
        let mut conn = self.conn.clone();
        let len: u64 = redis::cmd("LLEN").arg(key).query_async(&mut conn).await?;
        Ok(len)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
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
        let body = encode_body(&job)?;

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(&self.jobs)
            .arg(&job.id)
            .arg(body)
            .ignore()
            .cmd("LPUSH")
            .arg(&self.pending)
            .arg(&job.id)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(queue = %self.name, job_id = %job.id, job_type, "Enqueued job");
        Ok(job.id)
    }

    async fn dequeue(&self) -> Result<Option<Job>, MqError> {
        let mut conn = self.conn.clone();
        loop {
            let reply: Option<Vec<String>> = self
                .dequeue_script
                .key(&self.pending)
                .key(&self.processing)
                .key(&self.jobs)
                .arg(Utc::now().timestamp_millis())
                .invoke_async(&mut conn)
                .await?;
            let Some(mut reply) = reply else {
                return Ok(None);
            };

            let body = if reply.len() == 3 { reply.pop() } else { None };
            let raw = reply.get(1).cloned();
            let Some(job_id) = reply.into_iter().next() else {
                return Err(MqError::Internal("empty dequeue reply".into()));
            };

            match body.as_deref().map(decode_body) {
                Some(Ok(job)) => return Ok(Some(job)),
                Some(Err(e)) => {
                    warn!(queue = %self.name, job_id = %job_id, error = %e, "Discarding unreadable job");
                    self.discard_orphan(&job_id, raw).await?;
                }
                None if raw.is_some() => {
                    warn!(queue = %self.name, job_id = %job_id, "Discarding unreadable job");
                    self.discard_orphan(&job_id, raw).await?;
                }
                None => {
                    warn!(queue = %self.name, job_id = %job_id, "Discarding job without body");
                    self.discard_orphan(&job_id, None).await?;
                }
            }
        }
    }

    async fn complete(&self, job_id: &str) -> Result<(), MqError> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .complete_script
            .key(&self.processing)
            .key(&self.jobs)
            .key(&self.completed)
            .key(&self.completed_count)
            .arg(job_id)
            .arg(self.last_ledger_index())
            .invoke_async(&mut conn)
            .await?;
        if removed == 0 {
            warn!(queue = %self.name, job_id, "Completed job was not processing");
        }
        Ok(())
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<FailOutcome, MqError> {
        let Some(job) = self.load(job_id).await? else {
            return Ok(FailOutcome::Unknown);
        };
        let attempts = job.attempts;

        if job.is_exhausted() {
            if self.move_to_failed(job, error).await? {
                return Ok(FailOutcome::Exhausted { attempts });
            }
        } else if self.move_to_pending(job_id).await? {
            return Ok(FailOutcome::Retrying { attempts });
        }
        Ok(FailOutcome::Unknown)
    }

    async fn fail_permanently(&self, job_id: &str, error: &str) -> Result<(), MqError> {
        match self.load(job_id).await? {
            Some(job) => {
                self.move_to_failed(job, error).await?;
            }
            None => self.discard_orphan(job_id, None).await?,
        }
        Ok(())
    }

    async fn queue_length(&self) -> Result<u64, MqError> {
        self.list_len(&self.pending).await
    }

    async fn processing_length(&self) -> Result<u64, MqError> {
        self.list_len(&self.processing).await
    }

    async fn stats(&self) -> Result<QueueStats, MqError> {
        let mut conn = self.conn.clone();
        let completed: Option<u64> = redis::cmd("GET")
            .arg(&self.completed_count)
            .query_async(&mut conn)
            .await?;
        Ok(QueueStats {
            pending: self.list_len(&self.pending).await?,
            processing: self.list_len(&self.processing).await?,
            completed: completed.unwrap_or(0),
            failed: self.list_len(&self.failed).await?,
        })
    }

    async fn failed_jobs(&self, limit: usize) -> Result<Vec<FailedJob>, MqError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let entries: Vec<String> = redis::cmd("LRANGE")
            .arg(&self.failed)
            .arg(0)
            .arg(limit as i64 - 1)
            .query_async(&mut conn)
            .await?;
        Ok(entries
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect())
    }

    async fn requeue_stale(&self, older_than: Duration) -> Result<usize, MqError> {
        let cutoff = Utc::now().timestamp_millis() - older_than.as_millis() as i64;

        let mut conn = self.conn.clone();
        let ids: Vec<String> = redis::cmd("LRANGE")
            .arg(&self.processing)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;

        let mut requeued = 0;
        for job_id in ids {
            let Some(job) = self.load(&job_id).await? else {
                continue;
            };
            if !job.started_before(cutoff) {
                continue;
            }
            let moved = if job.is_exhausted() {
                self.move_to_failed(job, STALE_ERROR).await?
            } else {
                self.move_to_pending(&job_id).await?
            };
            if moved {
                requeued += 1;
            }
        }
        Ok(requeued)
    }
}
