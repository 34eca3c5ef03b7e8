use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::GameRecord;
use mq::KvStore;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::IgdbConfig;
use crate::error::IgdbError;
use crate::query::{ids_query, search_query};
use crate::source::CatalogSource;
use crate::token::TokenCache;
use crate::types::IgdbGame;

/// Rate-limited IGDB `/games` client.
pub struct IgdbClient {
    http: reqwest::Client,
    config: IgdbConfig,
    tokens: TokenCache,
    last_request: Mutex<Option<Instant>>,
}

impl IgdbClient {
    pub fn new(config: IgdbConfig, kv: Arc<dyn KvStore>) -> Result<Self, IgdbError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gamedex/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let tokens = TokenCache::new(http.clone(), kv, config.clone());

        Ok(Self {
            http,
            config,
            tokens,
            last_request: Mutex::new(None),
        })
    }

    fn games_url(&self) -> String {
        format!("{}/games", self.config.api_url.trim_end_matches('/'))
    }

    /// Space requests so the client never exceeds the configured rate.
    async fn throttle(&self) {
        let min_gap = Duration::from_millis(1000 / u64::from(self.config.requests_per_second.max(1)));
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < min_gap {
                tokio::time::sleep(min_gap - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn post_games(&self, body: String) -> Result<Vec<IgdbGame>, IgdbError> {
        let mut refreshed = false;
        loop {
            self.throttle().await;
            let authorization = self.tokens.bearer().await?;

            let response = self
                .http
                .post(self.games_url())
                .header("Client-ID", &self.config.client_id)
                .header(AUTHORIZATION, authorization)
                .header(CONTENT_TYPE, "text/plain")
                .body(body.clone())
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !refreshed {
                warn!("IGDB rejected access token, refreshing");
                self.tokens.invalidate().await?;
                refreshed = true;
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(IgdbError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            return Ok(response.json().await?);
        }
    }
}

#[async_trait]
impl CatalogSource for IgdbClient {
    async fn search_by_name(
        &self,
        query: &str,
        only_main_games: bool,
        limit: u64,
    ) -> Result<Vec<GameRecord>, IgdbError> {
        let games = self
            .post_games(search_query(query, only_main_games, limit))
            .await?;
        debug!(query, count = games.len(), "IGDB search returned");
        Ok(games.into_iter().map(GameRecord::from).collect())
    }

    async fn fetch_by_ids(
        &self,
        ids: &[i64],
        only_main_games: bool,
    ) -> Result<Vec<GameRecord>, IgdbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let games = self.post_games(ids_query(ids, only_main_games)).await?;
        debug!(requested = ids.len(), count = games.len(), "IGDB id lookup returned");
        Ok(games.into_iter().map(GameRecord::from).collect())
    }
}
