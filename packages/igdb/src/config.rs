use serde::Deserialize;

/// IGDB API access configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct IgdbConfig {
    /// Twitch application client id. Default: empty (requests fail until set).
    #[serde(default)]
    pub client_id: String,
    /// Twitch application client secret. Default: empty.
    #[serde(default)]
    pub client_secret: String,
    /// Default: "https://api.igdb.com/v4".
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Default: "https://id.twitch.tv/oauth2/token".
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Per-request timeout in seconds. Default: 10.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Request rate shared by all callers of one client. Default: 4.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// Upper bound on how long a cached access token is reused. Default: 86400.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

fn default_api_url() -> String {
    "https://api.igdb.com/v4".into()
}
fn default_token_url() -> String {
    "https://id.twitch.tv/oauth2/token".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_requests_per_second() -> u32 {
    4
}
fn default_token_ttl_secs() -> u64 {
    86400
}

impl Default for IgdbConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_url: default_api_url(),
            token_url: default_token_url(),
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl IgdbConfig {
    pub fn has_credentials(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}
