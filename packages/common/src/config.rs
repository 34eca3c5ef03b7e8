use serde::Deserialize;

/// App-level Redis / job queue configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Queue consumed by the catalog writer. Default: "catalog_write".
    #[serde(default = "default_mq_queue_name")]
    pub queue_name: String,
    /// Delivery attempts before a job lands in the failed ledger. Default: 3.
    #[serde(default = "default_mq_max_attempts")]
    pub max_attempts: u32,
    /// Entries kept in the completed and failed ledgers. Default: 1000.
    #[serde(default = "default_mq_ledger_limit")]
    pub ledger_limit: usize,
}

fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_queue_name() -> String {
    "catalog_write".into()
}
fn default_mq_max_attempts() -> u32 {
    3
}
fn default_mq_ledger_limit() -> usize {
    1000
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            url: default_mq_url(),
            queue_name: default_mq_queue_name(),
            max_attempts: default_mq_max_attempts(),
            ledger_limit: default_mq_ledger_limit(),
        }
    }
}
