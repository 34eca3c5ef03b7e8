use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{GameRecord, ImageRecord, NamedRef};
use igdb::{CatalogSource, IgdbError};
use mq::{JobQueue, KvStore, MemoryJobQueue, MemoryKv};
use reqwest::Client;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait};
use serde_json::Value;
use tokio::sync::Mutex;

use server::config::{SearchConfig, SimilarGamesConfig};
use server::consumers::CatalogWriter;
use server::search::SearchService;
use server::similar::{SimilarGamesStaging, SimilarGamesWorker};
use server::state::AppState;

pub const QUEUE_NAME: &str = "catalog_write";

pub mod routes {
    pub const SEARCH: &str = "/api/v1/games/search";
    pub const QUEUES: &str = "/api/v1/admin/queues";
    pub const OPENAPI: &str = "/api-docs/openapi.json";
}

/// Scripted upstream catalog.
#[derive(Default)]
pub struct FakeCatalog {
    games: Mutex<BTreeMap<i64, GameRecord>>,
    search_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    failing: AtomicBool,
    delay: Mutex<Duration>,
}

impl FakeCatalog {
    pub async fn add(&self, record: GameRecord) {
        self.games.lock().await.insert(record.id, record);
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = delay;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn check_failing(&self) -> Result<(), IgdbError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(IgdbError::Status {
                status: 503,
                body: "upstream unavailable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn search_by_name(
        &self,
        query: &str,
        _only_main_games: bool,
        limit: u64,
    ) -> Result<Vec<GameRecord>, IgdbError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check_failing()?;

        let needle = query.to_lowercase();
        Ok(self
            .games
            .lock()
            .await
            .values()
            .filter(|g| g.name.to_lowercase().contains(&needle))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_by_ids(
        &self,
        ids: &[i64],
        _only_main_games: bool,
    ) -> Result<Vec<GameRecord>, IgdbError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;

        let games = self.games.lock().await;
        Ok(ids.iter().filter_map(|id| games.get(id).cloned()).collect())
    }
}

/// In-process pipeline over SQLite, an in-memory queue and key-value store,
/// and a scripted upstream.
pub struct TestContext {
    pub db: DatabaseConnection,
    pub kv: Arc<MemoryKv>,
    pub queue: Arc<MemoryJobQueue>,
    pub source: Arc<FakeCatalog>,
    pub staging: SimilarGamesStaging,
}

impl TestContext {
    pub async fn new() -> Self {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        // One connection keeps every query on the same in-memory database.
        opts.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(opts)
            .await
            .expect("Failed to open in-memory SQLite");
        server::database::sync_schema(&db)
            .await
            .expect("Failed to sync schema");

        let kv = Arc::new(MemoryKv::new());
        let staging = SimilarGamesStaging::new(kv.clone());

        Self {
            db,
            kv,
            queue: Arc::new(MemoryJobQueue::new(QUEUE_NAME, 3)),
            source: Arc::new(FakeCatalog::default()),
            staging,
        }
    }

    pub fn search_config() -> SearchConfig {
        SearchConfig {
            duplicate_wait_ms: 200,
            ..Default::default()
        }
    }

    pub fn similar_config() -> SimilarGamesConfig {
        SimilarGamesConfig {
            fetch_batch_delay_ms: 0,
            ..Default::default()
        }
    }

    pub fn search(&self) -> SearchService {
        self.search_with(Self::search_config())
    }

    pub fn search_with(&self, config: SearchConfig) -> SearchService {
        SearchService::new(
            self.db.clone(),
            self.kv.clone(),
            self.queue.clone(),
            self.source.clone(),
            self.staging.clone(),
            config,
        )
    }

    pub fn writer(&self) -> CatalogWriter {
        CatalogWriter::new(
            self.db.clone(),
            self.queue.clone(),
            self.kv.clone(),
            self.staging.clone(),
        )
    }

    pub fn worker(&self) -> SimilarGamesWorker {
        self.worker_with(Self::similar_config())
    }

    pub fn worker_with(&self, config: SimilarGamesConfig) -> SimilarGamesWorker {
        SimilarGamesWorker::new(
            self.db.clone(),
            self.queue.clone(),
            self.staging.clone(),
            self.source.clone(),
            config,
        )
    }

    /// Run the catalog writer until the queue is empty; returns jobs handled.
    pub async fn drain_writer(&self) -> usize {
        let writer = self.writer();
        let mut handled = 0;
        while writer.poll_once().await.expect("Writer poll failed") {
            handled += 1;
        }
        handled
    }

    pub async fn count<E>(&self, _entity: E) -> u64
    where
        E: EntityTrait,
        E::Model: Sync,
    {
        E::find()
            .count(&self.db)
            .await
            .expect("Failed to count rows")
    }

    pub async fn pending_similar(&self) -> Vec<i64> {
        let mut ids = self
            .staging
            .sample_pending(1000)
            .await
            .expect("Failed to read pending set");
        ids.sort();
        ids
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.kv.get(key).await.expect("Failed to read key")
    }

    pub async fn queue_lengths(&self) -> (u64, u64) {
        (
            self.queue.queue_length().await.expect("queue_length"),
            self.queue.processing_length().await.expect("processing_length"),
        )
    }

    pub async fn spawn_app(&self) -> TestApp {
        let state = AppState {
            search: self.search(),
            queue: self.queue.clone(),
            staging: self.staging.clone(),
        };
        let app = server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestApp {
            addr,
            client: Client::new(),
        }
    }
}

/// Let spawned fire-and-forget tasks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// A minimal upstream record.
pub fn record(id: i64, name: &str) -> GameRecord {
    GameRecord {
        id,
        name: name.to_string(),
        slug: name.to_lowercase().replace(' ', "-"),
        ..Default::default()
    }
}

pub fn named(name: &str, slug: &str) -> NamedRef {
    NamedRef {
        id: None,
        name: name.to_string(),
        slug: slug.to_string(),
    }
}

pub fn image(hash: &str) -> ImageRecord {
    ImageRecord {
        id: None,
        hash: hash.to_string(),
        width: Some(264),
        height: Some(352),
    }
}

/// A running HTTP server over a [`TestContext`].
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        let status = res.status().as_u16();
        let text = res.text().await.expect("Failed to read response body");
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        TestResponse { status, body }
    }
}
