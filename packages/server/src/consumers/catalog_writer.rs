use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::GameRecord;
use common::retry::calculate_backoff;
use mq::{Job, JobQueue, KvStore, MqError};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogStore, catalog_store};
use crate::config::WriterConfig;
use crate::similar::SimilarGamesStaging;

pub const INSERT_SINGLE: &str = "insert_single";
pub const INSERT_BATCH: &str = "insert_batch";
pub const UPDATE_SINGLE: &str = "update_single";

/// How long a batch's write status stays readable.
pub const WRITE_STATUS_TTL: Duration = Duration::from_secs(3600);

pub fn write_status_key(search_id: &str) -> String {
    format!("write_status:{search_id}")
}

/// Payload of an `insert_batch` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertBatchPayload {
    pub games: Vec<GameRecord>,
    /// Correlation id of the search that produced the batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum JobParseError {
    #[error("unknown job type '{0}'")]
    UnknownType(String),
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A decoded catalog writer job.
#[derive(Debug, Clone)]
pub enum CatalogJob {
    InsertSingle(GameRecord),
    InsertBatch(InsertBatchPayload),
    UpdateSingle(GameRecord),
}

impl CatalogJob {
    pub fn parse(job: &Job) -> Result<Self, JobParseError> {
        let payload = job.payload.clone();
        match job.job_type.as_str() {
            INSERT_SINGLE => Ok(CatalogJob::InsertSingle(serde_json::from_value(payload)?)),
            INSERT_BATCH => Ok(CatalogJob::InsertBatch(serde_json::from_value(payload)?)),
            UPDATE_SINGLE => Ok(CatalogJob::UpdateSingle(serde_json::from_value(payload)?)),
            other => Err(JobParseError::UnknownType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Records skipped because the game already existed (or, for updates, did not).
    pub skipped: usize,
}

/// Applies catalog writer jobs to the store.
pub struct CatalogWriter {
    db: DatabaseConnection,
    queue: Arc<dyn JobQueue>,
    kv: Arc<dyn KvStore>,
    staging: SimilarGamesStaging,
}

impl CatalogWriter {
    pub fn new(
        db: DatabaseConnection,
        queue: Arc<dyn JobQueue>,
        kv: Arc<dyn KvStore>,
        staging: SimilarGamesStaging,
    ) -> Self {
        Self {
            db,
            queue,
            kv,
            staging,
        }
    }

    /// Dequeue and handle at most one job. Returns whether a job was found.
    pub async fn poll_once(&self) -> Result<bool, MqError> {
        match self.queue.dequeue().await? {
            Some(job) => {
                self.handle(job).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply `job` and settle it on the queue.
    ///
    /// Undecodable jobs fail permanently; apply errors go through the normal
    /// retry path.
    pub async fn handle(&self, job: Job) -> Result<(), MqError> {
        let parsed = match CatalogJob::parse(&job) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(job_id = %job.id, job_type = %job.job_type, error = %e, "Discarding malformed job");
                return self.queue.fail_permanently(&job.id, &e.to_string()).await;
            }
        };

        match self.apply(parsed).await {
            Ok(summary) => {
                debug!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "Job applied"
                );
                self.queue.complete(&job.id).await
            }
            Err(e) => {
                let outcome = self.queue.fail(&job.id, &e.to_string()).await?;
                warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempts = job.attempts,
                    outcome = ?outcome,
                    error = %e,
                    "Job failed"
                );
                Ok(())
            }
        }
    }

    pub async fn apply(&self, job: CatalogJob) -> anyhow::Result<WriteSummary> {
        match job {
            CatalogJob::InsertSingle(record) => self.insert_single(record).await,
            CatalogJob::InsertBatch(payload) => {
                let result = self.insert_batch(&payload.games).await;
                if let Some(search_id) = &payload.search_id {
                    let status = match &result {
                        Ok(_) => "complete".to_string(),
                        Err(e) => format!("error:{e}"),
                    };
                    self.record_write_status(search_id, &status).await;
                }
                result
            }
            CatalogJob::UpdateSingle(record) => self.update_single(record).await,
        }
    }

    async fn insert_single(&self, record: GameRecord) -> anyhow::Result<WriteSummary> {
        if catalog_store(&self.db).game_exists(record.id).await? {
            debug!(game_id = record.id, "Game already stored, skipping insert");
            return Ok(WriteSummary {
                skipped: 1,
                ..Default::default()
            });
        }

        let txn = self.db.begin().await?;
        let created = CatalogStore::new(&txn).insert_game(&record).await?;
        txn.commit().await?;

        if !created {
            return Ok(WriteSummary {
                skipped: 1,
                ..Default::default()
            });
        }
        info!(game_id = record.id, name = %record.name, "Inserted game");
        self.stage_similar(&record).await;
        Ok(WriteSummary {
            inserted: 1,
            ..Default::default()
        })
    }

    async fn insert_batch(&self, games: &[GameRecord]) -> anyhow::Result<WriteSummary> {
        let ids: Vec<i64> = games.iter().map(|g| g.id).collect();
        let existing = catalog_store(&self.db).existing_ids(&ids).await?;

        let mut seen = HashSet::new();
        let fresh: Vec<&GameRecord> = games
            .iter()
            .filter(|g| !existing.contains(&g.id) && seen.insert(g.id))
            .collect();
        let mut summary = WriteSummary {
            skipped: games.len() - fresh.len(),
            ..Default::default()
        };
        if fresh.is_empty() {
            debug!(count = games.len(), "Batch already stored");
            return Ok(summary);
        }

        let txn = self.db.begin().await?;
        let store = CatalogStore::new(&txn);
        let mut created = Vec::with_capacity(fresh.len());
        for record in fresh {
            if store.insert_game(record).await? {
                created.push(record);
            } else {
                summary.skipped += 1;
            }
        }
        txn.commit().await?;

        summary.inserted = created.len();
        info!(inserted = summary.inserted, skipped = summary.skipped, "Inserted game batch");
        for record in created {
            self.stage_similar(record).await;
        }
        Ok(summary)
    }

    async fn update_single(&self, record: GameRecord) -> anyhow::Result<WriteSummary> {
        let txn = self.db.begin().await?;
        let updated = CatalogStore::new(&txn).update_game(&record).await?;
        txn.commit().await?;

        if !updated {
            warn!(game_id = record.id, "Update for unknown game ignored");
            return Ok(WriteSummary {
                skipped: 1,
                ..Default::default()
            });
        }
        info!(game_id = record.id, "Updated game");
        self.stage_similar(&record).await;
        Ok(WriteSummary {
            updated: 1,
            ..Default::default()
        })
    }

    /// Best effort: a staging failure never undoes the committed write.
    async fn stage_similar(&self, record: &GameRecord) {
        let similar = record.similar_ids();
        if similar.is_empty() {
            return;
        }
        if let Err(e) = self.staging.store_relationships(record.id, &similar).await {
            warn!(game_id = record.id, error = %e, "Failed to stage similar games");
        }
    }

    async fn record_write_status(&self, search_id: &str, status: &str) {
        let key = write_status_key(search_id);
        if let Err(e) = self.kv.set(&key, status, Some(WRITE_STATUS_TTL)).await {
            warn!(search_id, error = %e, "Failed to record write status");
        }
    }
}

/// Poll the write queue until `shutdown` flips.
pub async fn run_catalog_writer(
    writer: CatalogWriter,
    config: WriterConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        queue = %writer.queue.name(),
        poll_interval_ms = config.poll_interval_ms,
        "Starting catalog writer"
    );

    let idle = Duration::from_millis(config.poll_interval_ms);
    let mut consecutive_errors: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let wait = match writer.poll_once().await {
            Ok(true) => {
                consecutive_errors = 0;
                continue;
            }
            Ok(false) => {
                consecutive_errors = 0;
                idle
            }
            Err(e) => {
                consecutive_errors = consecutive_errors.saturating_add(1);
                let backoff = calculate_backoff(
                    consecutive_errors,
                    config.poll_interval_ms,
                    config.max_backoff_ms,
                );
                error!(
                    error = %e,
                    consecutive_errors,
                    backoff_ms = backoff.as_millis() as u64,
                    "Catalog writer poll failed"
                );
                backoff
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => break,
        }
    }

    info!("Catalog writer stopped");
}
