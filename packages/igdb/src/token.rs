use std::sync::Arc;
use std::time::Duration;

use mq::KvStore;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::IgdbConfig;
use crate::error::IgdbError;

/// Key under which the `Bearer <token>` header value is cached.
pub const TOKEN_KEY: &str = "igdb:access_token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

/// Client-credentials access token, shared across processes through the KV store.
pub struct TokenCache {
    http: reqwest::Client,
    kv: Arc<dyn KvStore>,
    config: IgdbConfig,
    refresh: Mutex<()>,
}

impl TokenCache {
    pub fn new(http: reqwest::Client, kv: Arc<dyn KvStore>, config: IgdbConfig) -> Self {
        Self {
            http,
            kv,
            config,
            refresh: Mutex::new(()),
        }
    }

    /// The `Authorization` header value, exchanging credentials on a cache miss.
    pub async fn bearer(&self) -> Result<String, IgdbError> {
        if let Some(cached) = self.kv.get(TOKEN_KEY).await? {
            return Ok(cached);
        }

        let _guard = self.refresh.lock().await;
        if let Some(cached) = self.kv.get(TOKEN_KEY).await? {
            return Ok(cached);
        }

        let token = self.request_new_token().await?;
        let max_ttl = Duration::from_secs(self.config.token_ttl_secs);
        let ttl = token
            .expires_in
            .map(|secs| Duration::from_secs(secs).min(max_ttl))
            .unwrap_or(max_ttl);

        let value = format!("Bearer {}", token.access_token);
        self.kv.set(TOKEN_KEY, &value, Some(ttl)).await?;
        info!(ttl_secs = ttl.as_secs(), "Obtained new IGDB access token");
        Ok(value)
    }

    /// Drop the cached token so the next call exchanges credentials again.
    pub async fn invalidate(&self) -> Result<(), IgdbError> {
        self.kv.delete(TOKEN_KEY).await?;
        Ok(())
    }

    async fn request_new_token(&self) -> Result<TokenResponse, IgdbError> {
        if !self.config.has_credentials() {
            return Err(IgdbError::MissingCredentials);
        }

        let response = self
            .http
            .post(&self.config.token_url)
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "IGDB token exchange rejected");
            return Err(IgdbError::Token(format!("{status}: {body}")));
        }

        Ok(response.json().await?)
    }
}
