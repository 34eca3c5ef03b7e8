use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use igdb::CatalogSource;
use mq::{JobQueue, JobQueueExt};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::staging::SimilarGamesStaging;
use crate::catalog::{CatalogStore, catalog_store};
use crate::config::SimilarGamesConfig;
use crate::consumers::catalog_writer::INSERT_SINGLE;

/// What one worker cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// The write queue was over the busy threshold; nothing was touched.
    pub skipped_busy: bool,
    /// Games moved to the processed set (including exhausted ones).
    pub processed: usize,
    /// Games left pending for a later cycle.
    pub deferred: usize,
    /// Games whose processing errored; they stay pending.
    pub failed: usize,
    /// Directed edges written.
    pub edges_created: u64,
    /// Catalog writer jobs enqueued for missing similar games.
    pub fetches_enqueued: usize,
}

enum GameOutcome {
    Processed,
    Deferred,
}

/// Resolves staged similar-game ids into persisted edges, one bounded batch per cycle.
pub struct SimilarGamesWorker {
    db: DatabaseConnection,
    queue: Arc<dyn JobQueue>,
    staging: SimilarGamesStaging,
    source: Arc<dyn CatalogSource>,
    config: SimilarGamesConfig,
}

impl SimilarGamesWorker {
    pub fn new(
        db: DatabaseConnection,
        queue: Arc<dyn JobQueue>,
        staging: SimilarGamesStaging,
        source: Arc<dyn CatalogSource>,
        config: SimilarGamesConfig,
    ) -> Self {
        Self {
            db,
            queue,
            staging,
            source,
            config,
        }
    }

    pub fn config(&self) -> &SimilarGamesConfig {
        &self.config
    }

    /// Run one cycle over up to `batch_size` pending games.
    pub async fn run_cycle(&self) -> anyhow::Result<CycleReport> {
        let mut report = CycleReport::default();

        let backlog = self.queue.queue_length().await? + self.queue.processing_length().await?;
        if backlog > self.config.busy_threshold {
            debug!(
                backlog,
                threshold = self.config.busy_threshold,
                "Write queue busy, skipping similar-games cycle"
            );
            report.skipped_busy = true;
            return Ok(report);
        }

        let pending = self.staging.sample_pending(self.config.batch_size).await?;
        for game_id in pending {
            let outcome = self.process_game(game_id, &mut report).await;
            match outcome {
                Ok(GameOutcome::Processed) => report.processed += 1,
                Ok(GameOutcome::Deferred) => report.deferred += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(game_id, error = %e, "Failed to process similar games");
                }
            }
        }

        Ok(report)
    }

    async fn process_game(
        &self,
        game_id: i64,
        report: &mut CycleReport,
    ) -> anyhow::Result<GameOutcome> {
        let store = catalog_store(&self.db);
        if !store.game_exists(game_id).await? {
            debug!(game_id, "Game not stored yet, leaving pending");
            return Ok(GameOutcome::Deferred);
        }

        let Some(staged) = self.staging.relationships(game_id).await? else {
            return self.discover(game_id).await;
        };

        let existing = store.existing_ids(&staged).await?;
        let linked = store.similar_ids_with_edges(game_id).await?;
        let to_link: Vec<i64> = staged
            .iter()
            .copied()
            .filter(|id| existing.contains(id) && !linked.contains(id))
            .collect();

        if !to_link.is_empty() {
            let txn = self.db.begin().await?;
            let created = CatalogStore::new(&txn)
                .insert_similar_edges(game_id, &to_link)
                .await?;
            txn.commit().await?;
            report.edges_created += created;
            debug!(game_id, linked = to_link.len(), created, "Created similar-game edges");
        }

        let missing: Vec<i64> = staged
            .iter()
            .copied()
            .filter(|id| !existing.contains(id))
            .collect();
        if missing.is_empty() {
            self.staging.mark_processed(game_id).await?;
            return Ok(GameOutcome::Processed);
        }

        let attempts = self.staging.fetch_attempts(game_id).await?;
        if attempts >= self.config.max_fetch_attempts {
            warn!(
                game_id,
                attempts,
                missing = ?missing,
                "Similar games still missing, giving up on them"
            );
            self.staging.mark_processed(game_id).await?;
            return Ok(GameOutcome::Processed);
        }

        report.fetches_enqueued += self.fetch_missing(&missing).await?;
        self.staging.record_fetch_attempt(game_id).await?;
        Ok(GameOutcome::Deferred)
    }

    /// Learn the similar ids of a stored game that has nothing staged yet.
    async fn discover(&self, game_id: i64) -> anyhow::Result<GameOutcome> {
        let records = self.source.fetch_by_ids(&[game_id], false).await?;
        let similar = records
            .iter()
            .find(|r| r.id == game_id)
            .map(|r| r.similar_ids())
            .unwrap_or_default();

        let staged = self
            .staging
            .store_relationships(game_id, &similar)
            .await?;
        if staged.is_empty() {
            debug!(game_id, "No similar games upstream");
            self.staging.mark_processed(game_id).await?;
            return Ok(GameOutcome::Processed);
        }

        debug!(game_id, count = staged.len(), "Staged similar games");
        Ok(GameOutcome::Deferred)
    }

    /// Fetch `ids` upstream in rate-limited batches and enqueue each record for insertion.
    /// Returns the number of jobs enqueued.
    pub async fn fetch_missing(&self, ids: &[i64]) -> anyhow::Result<usize> {
        let unique: Vec<i64> = {
            let mut seen = HashSet::new();
            ids.iter().copied().filter(|id| seen.insert(*id)).collect()
        };
        let delay = Duration::from_millis(self.config.fetch_batch_delay_ms);
        let mut enqueued = 0;

        for (index, chunk) in unique
            .chunks(self.config.fetch_batch_size.max(1))
            .enumerate()
        {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let records = self.source.fetch_by_ids(chunk, false).await?;
            for record in &records {
                let job_id = self.queue.enqueue_json(INSERT_SINGLE, record).await?;
                debug!(game_id = record.id, job_id = %job_id, "Enqueued missing similar game");
                enqueued += 1;
            }
        }

        Ok(enqueued)
    }
}

/// Run the similar-games worker on a fixed interval until `shutdown` flips.
pub async fn run_similar_games_worker(
    worker: SimilarGamesWorker,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = Duration::from_secs(worker.config().interval_secs.max(1));

    info!(
        interval_secs = worker.config().interval_secs,
        batch_size = worker.config().batch_size,
        busy_threshold = worker.config().busy_threshold,
        "Starting similar-games worker"
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        match worker.run_cycle().await {
            Ok(report) if report.skipped_busy => {}
            Ok(report) => {
                if report.processed + report.deferred + report.failed > 0 {
                    info!(
                        processed = report.processed,
                        deferred = report.deferred,
                        failed = report.failed,
                        edges_created = report.edges_created,
                        fetches_enqueued = report.fetches_enqueued,
                        "Similar-games cycle finished"
                    );
                }
            }
            Err(e) => error!(error = %e, "Similar-games cycle failed"),
        }
    }

    info!("Similar-games worker stopped");
}
