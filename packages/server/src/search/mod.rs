//! Cached, de-duplicated game search across the result cache, the catalog
//! store and the upstream catalog.

mod query;

pub use query::{cache_key, lock_key, normalize_query, strip_punctuation};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use common::GameRecord;
use igdb::CatalogSource;
use mq::{JobQueue, JobQueueExt, KvStore, MqError};
use sea_orm::{DatabaseConnection, DbErr};
use tracing::{debug, info, instrument, warn};

use crate::catalog::catalog_store;
use crate::config::SearchConfig;
use crate::consumers::catalog_writer::{INSERT_BATCH, InsertBatchPayload};
use crate::entity::game;
use crate::models::game::GameResponse;
use crate::models::search::{CachedSearch, SearchResponse, SearchSource};
use crate::similar::SimilarGamesStaging;

pub const EMPTY_QUERY_ERROR: &str = "Search query is required";

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("cache error: {0}")]
    Cache(#[from] MqError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Dedup marker held for the duration of one search.
///
/// Released explicitly on the normal path; if the search future is dropped
/// first, `Drop` hands the delete to a spawned task instead.
struct SearchLock {
    kv: Arc<dyn KvStore>,
    key: Option<String>,
}

impl SearchLock {
    async fn acquire(kv: Arc<dyn KvStore>, key: String, ttl: Duration) -> Result<Self, MqError> {
        kv.set(&key, "1", Some(ttl)).await?;
        Ok(Self { kv, key: Some(key) })
    }

    async fn release(mut self) {
        if let Some(key) = self.key.take() {
            release_lock(self.kv.as_ref(), &key).await;
        }
    }
}

impl Drop for SearchLock {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(key = %key, "No runtime to release search lock, leaving it to expire");
            return;
        };
        let kv = self.kv.clone();
        handle.spawn(async move {
            debug!(key = %key, "Releasing lock of an abandoned search");
            release_lock(kv.as_ref(), &key).await;
        });
    }
}

async fn release_lock(kv: &dyn KvStore, key: &str) {
    if let Err(e) = kv.delete(key).await {
        warn!(key = %key, error = %e, "Failed to release search lock");
    }
}

#[derive(Clone)]
pub struct SearchService {
    db: DatabaseConnection,
    kv: Arc<dyn KvStore>,
    queue: Arc<dyn JobQueue>,
    source: Arc<dyn CatalogSource>,
    staging: SimilarGamesStaging,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(
        db: DatabaseConnection,
        kv: Arc<dyn KvStore>,
        queue: Arc<dyn JobQueue>,
        source: Arc<dyn CatalogSource>,
        staging: SimilarGamesStaging,
        config: SearchConfig,
    ) -> Self {
        Self {
            db,
            kv,
            queue,
            source,
            staging,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search by name, consulting the cache, then the store, then upstream.
    ///
    /// A blank query is not an error: it yields an empty result with
    /// `source = none` and an explanatory `meta.error`.
    #[instrument(skip(self), fields(source = tracing::field::Empty))]
    pub async fn search(
        &self,
        query: &str,
        limit: u64,
        offset: u64,
        force_fresh: bool,
    ) -> Result<SearchResponse, SearchError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(SearchResponse::invalid(EMPTY_QUERY_ERROR));
        }
        let cache_key = cache_key(&normalized, limit, offset);
        let lock_key = lock_key(&normalized, limit, offset);

        if !force_fresh && self.kv.exists(&lock_key).await? {
            debug!(query = %normalized, "Duplicate search in flight, waiting for its results");
            let started = Instant::now();
            if let Some(hit) = self.cached(&cache_key).await? {
                return Ok(deduplicated(hit, started));
            }
            tokio::time::sleep(Duration::from_millis(self.config.duplicate_wait_ms)).await;
            if let Some(hit) = self.cached(&cache_key).await? {
                return Ok(deduplicated(hit, started));
            }
        }

        let lock = SearchLock::acquire(
            self.kv.clone(),
            lock_key,
            Duration::from_secs(self.config.lock_ttl_secs),
        )
        .await?;

        let result = self
            .search_locked(query.trim(), &normalized, &cache_key, limit, offset, force_fresh)
            .await;

        lock.release().await;

        if let Ok(response) = &result {
            tracing::Span::current().record("source", response.meta.source.as_str());
        }
        result
    }

    async fn search_locked(
        &self,
        query: &str,
        normalized: &str,
        cache_key: &str,
        limit: u64,
        offset: u64,
        force_fresh: bool,
    ) -> Result<SearchResponse, SearchError> {
        if force_fresh {
            debug!(query = %normalized, "Fresh results requested, bypassing cache");
        } else {
            let started = Instant::now();
            if let Some(hit) = self.cached(cache_key).await? {
                return Ok(SearchResponse::new(
                    hit.results,
                    SearchSource::Cache,
                    elapsed_ms(started),
                ));
            }
        }

        let started = Instant::now();
        let games = self.search_store(query, limit, offset).await?;
        if !games.is_empty() {
            let results = catalog_store(&self.db).load_responses(games).await?;
            let elapsed = elapsed_ms(started);
            self.write_cache(cache_key, &results).await?;
            self.discover_similar(results.iter().map(|g| g.id).collect());
            info!(query = %normalized, total = results.len(), "Search served from database");
            return Ok(SearchResponse::new(results, SearchSource::Database, elapsed));
        }

        let upstream_started = Instant::now();
        let records = self.search_upstream(query, limit).await;
        if records.is_empty() {
            info!(query = %normalized, "No results in any tier");
            let mut response =
                SearchResponse::new(Vec::new(), SearchSource::All, elapsed_ms(started));
            response.meta.freshness = None;
            return Ok(response);
        }
        let elapsed = elapsed_ms(upstream_started);

        let results: Vec<GameResponse> = records.iter().map(GameResponse::from).collect();
        self.write_cache(cache_key, &results).await?;

        let search_id = format!("search:{}:{}", normalized, Utc::now().timestamp());
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        let payload = InsertBatchPayload {
            games: records,
            search_id: Some(search_id.clone()),
        };
        let job_id = self.queue.enqueue_json(INSERT_BATCH, &payload).await?;
        info!(
            query = %normalized,
            total = results.len(),
            job_id = %job_id,
            search_id = %search_id,
            "Search served from upstream, batch enqueued for persistence"
        );

        self.discover_similar(ids);
        Ok(SearchResponse::new(results, SearchSource::Igdb, elapsed))
    }

    /// Substring match on the query, topped up with a punctuation-stripped
    /// variant when the first pass comes back short.
    async fn search_store(
        &self,
        query: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<game::Model>, DbErr> {
        let store = catalog_store(&self.db);
        let mut games = store.search_by_name(query, &[], limit, offset).await?;

        let cleaned = strip_punctuation(query);
        let found = games.len() as u64;
        if found < limit && !cleaned.is_empty() && cleaned != query {
            let exclude: Vec<i64> = games.iter().map(|g| g.id).collect();
            let more = store
                .search_by_name(
                    &cleaned,
                    &exclude,
                    limit - found,
                    offset.saturating_sub(found),
                )
                .await?;
            games.extend(more);
        }
        Ok(games)
    }

    /// Upstream failures are logged and read as "no results".
    async fn search_upstream(&self, query: &str, limit: u64) -> Vec<GameRecord> {
        let records = match self.source.search_by_name(query, true, limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!(query, error = %e, "Upstream search failed");
                Vec::new()
            }
        };
        if !records.is_empty() {
            return records;
        }

        let cleaned = strip_punctuation(query);
        if cleaned.is_empty() || cleaned == query {
            return records;
        }
        debug!(query, cleaned = %cleaned, "Retrying upstream search without punctuation");
        match self.source.search_by_name(&cleaned, true, limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!(query = %cleaned, error = %e, "Upstream search failed");
                Vec::new()
            }
        }
    }

    async fn cached(&self, key: &str) -> Result<Option<CachedSearch>, SearchError> {
        let Some(raw) = self.kv.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(key, error = %e, "Ignoring unreadable cache entry");
                Ok(None)
            }
        }
    }

    async fn write_cache(&self, key: &str, results: &[GameResponse]) -> Result<(), SearchError> {
        let entry = CachedSearch {
            results: results.to_vec(),
            timestamp: Utc::now().timestamp_millis(),
        };
        let encoded = serde_json::to_string(&entry)?;
        self.kv
            .set(
                key,
                &encoded,
                Some(Duration::from_secs(self.config.cache_ttl_secs)),
            )
            .await?;
        Ok(())
    }

    /// Fire-and-forget: queue result ids for similar-games discovery.
    fn discover_similar(&self, ids: Vec<i64>) {
        if ids.is_empty() {
            return;
        }
        let staging = self.staging.clone();
        tokio::spawn(async move {
            match staging.discover(&ids).await {
                Ok(added) => debug!(added, "Queued games for similar-games discovery"),
                Err(e) => warn!(ids = ?ids, error = %e, "Failed to queue similar-games discovery"),
            }
        });
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn deduplicated(hit: CachedSearch, started: Instant) -> SearchResponse {
    let mut response = SearchResponse::new(hit.results, SearchSource::Cache, elapsed_ms(started));
    response.meta.deduplicated = Some(true);
    response
}
