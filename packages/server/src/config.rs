use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::MqAppConfig;
pub use igdb::IgdbConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Default: 20.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Default: 2.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}

/// Search cache and request de-duplication.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Result cache lifetime. Default: 86400 (24h).
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Lifetime of the in-flight marker. Default: 10.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    /// How long a duplicate request waits for the in-flight one. Default: 1000.
    #[serde(default = "default_duplicate_wait_ms")]
    pub duplicate_wait_ms: u64,
    /// Default: 50.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// Default: 500.
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
}

fn default_cache_ttl_secs() -> u64 {
    86400
}
fn default_lock_ttl_secs() -> u64 {
    10
}
fn default_duplicate_wait_ms() -> u64 {
    1000
}
fn default_limit() -> u64 {
    50
}
fn default_max_limit() -> u64 {
    500
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
            duplicate_wait_ms: default_duplicate_wait_ms(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

/// Catalog writer polling.
#[derive(Debug, Deserialize, Clone)]
pub struct WriterConfig {
    /// Sleep between polls of an empty queue. Default: 1000.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Ceiling for the backoff after queue errors. Default: 30000.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    30000
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Similar-games worker.
#[derive(Debug, Deserialize, Clone)]
pub struct SimilarGamesConfig {
    /// Default: true.
    #[serde(default = "default_similar_enabled")]
    pub enabled: bool,
    /// Seconds between cycles. Default: 60.
    #[serde(default = "default_similar_interval_secs")]
    pub interval_secs: u64,
    /// Pending ids taken per cycle. Default: 25.
    #[serde(default = "default_similar_batch_size")]
    pub batch_size: usize,
    /// Skip the cycle when the write queue holds more jobs than this. Default: 10.
    #[serde(default = "default_busy_threshold")]
    pub busy_threshold: u64,
    /// Ids per upstream fetch. Default: 25.
    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: usize,
    /// Pause between upstream fetch batches. Default: 1000.
    #[serde(default = "default_fetch_batch_delay_ms")]
    pub fetch_batch_delay_ms: u64,
    /// Dependency-fetch rounds before missing similar ids are given up. Default: 5.
    #[serde(default = "default_max_fetch_attempts")]
    pub max_fetch_attempts: u32,
}

fn default_similar_enabled() -> bool {
    true
}
fn default_similar_interval_secs() -> u64 {
    60
}
fn default_similar_batch_size() -> usize {
    25
}
fn default_busy_threshold() -> u64 {
    10
}
fn default_fetch_batch_size() -> usize {
    25
}
fn default_fetch_batch_delay_ms() -> u64 {
    1000
}
fn default_max_fetch_attempts() -> u32 {
    5
}

impl Default for SimilarGamesConfig {
    fn default() -> Self {
        Self {
            enabled: default_similar_enabled(),
            interval_secs: default_similar_interval_secs(),
            batch_size: default_similar_batch_size(),
            busy_threshold: default_busy_threshold(),
            fetch_batch_size: default_fetch_batch_size(),
            fetch_batch_delay_ms: default_fetch_batch_delay_ms(),
            max_fetch_attempts: default_max_fetch_attempts(),
        }
    }
}

/// Stranded processing-job detector.
#[derive(Debug, Deserialize, Clone)]
pub struct StaleJobConfig {
    /// Default: false.
    #[serde(default)]
    pub enabled: bool,
    /// Processing time after which a job is considered stranded. Default: 300.
    #[serde(default = "default_stale_timeout_secs")]
    pub timeout_secs: u64,
    /// Default: 60.
    #[serde(default = "default_stale_scan_interval_secs")]
    pub scan_interval_secs: u64,
}

fn default_stale_timeout_secs() -> u64 {
    300
}
fn default_stale_scan_interval_secs() -> u64 {
    60
}

impl Default for StaleJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: default_stale_timeout_secs(),
            scan_interval_secs: default_stale_scan_interval_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
    #[serde(default)]
    pub igdb: IgdbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub similar_games: SimilarGamesConfig,
    #[serde(default)]
    pub stale_jobs: StaleJobConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("GAMEDEX_CONFIG").unwrap_or_else(|_| "config/config".into());
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            // Load from config/config.toml
            .add_source(File::with_name(&path).required(false))
            // Override from environment (e.g., GAMEDEX__IGDB__CLIENT_ID)
            .add_source(Environment::with_prefix("GAMEDEX").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
