use std::sync::Arc;

use common::sanitize_similar_ids;
use mq::{KvStore, MqError};
use serde::Serialize;
use tracing::warn;

pub const PENDING_KEY: &str = "similar_games:pending";
pub const PROCESSED_KEY: &str = "similar_games:processed";
pub const RELATIONSHIPS_KEY: &str = "similar_games:relationships";
pub const FETCH_ATTEMPTS_KEY: &str = "similar_games:fetch_attempts";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimilarGamesStats {
    pub pending: u64,
    pub processed: u64,
    pub staged: u64,
}

/// Relationship staging state shared by the writer, the search path and the worker.
///
/// A game id is either pending (edges still to be built), processed (terminal)
/// or unknown. Staged relationships map a game id to its sanitized similar ids.
#[derive(Clone)]
pub struct SimilarGamesStaging {
    kv: Arc<dyn KvStore>,
}

impl SimilarGamesStaging {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Stage the similar ids of `game_id` and mark it pending.
    ///
    /// Returns the ids actually staged; nothing is written when none survive
    /// sanitizing.
    pub async fn store_relationships(
        &self,
        game_id: i64,
        similar_ids: &[i64],
    ) -> Result<Vec<i64>, MqError> {
        let ids = sanitize_similar_ids(game_id, similar_ids.iter().copied());
        if ids.is_empty() {
            return Ok(ids);
        }
        let encoded = serde_json::to_string(&ids)?;
        self.kv
            .hash_set(RELATIONSHIPS_KEY, &game_id.to_string(), &encoded)
            .await?;
        self.kv
            .set_add(PENDING_KEY, &[game_id.to_string()])
            .await?;
        Ok(ids)
    }

    pub async fn relationships(&self, game_id: i64) -> Result<Option<Vec<i64>>, MqError> {
        match self
            .kv
            .hash_get(RELATIONSHIPS_KEY, &game_id.to_string())
            .await?
        {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Queue ids for relationship discovery, skipping those already processed.
    /// Returns how many were newly marked pending.
    pub async fn discover(&self, game_ids: &[i64]) -> Result<u64, MqError> {
        let mut fresh = Vec::with_capacity(game_ids.len());
        for id in game_ids.iter().filter(|&&id| id > 0) {
            let member = id.to_string();
            if !self.kv.set_contains(PROCESSED_KEY, &member).await? {
                fresh.push(member);
            }
        }
        self.kv.set_add(PENDING_KEY, &fresh).await
    }

    /// Up to `count` pending game ids. Ids stay pending until marked processed.
    pub async fn sample_pending(&self, count: usize) -> Result<Vec<i64>, MqError> {
        let members = self.kv.set_sample(PENDING_KEY, count).await?;
        let mut ids = Vec::with_capacity(members.len());
        for member in members {
            match member.parse::<i64>() {
                Ok(id) => ids.push(id),
                Err(_) => {
                    warn!(member = %member, "Dropping malformed pending similar-games id");
                    self.kv.set_remove(PENDING_KEY, &member).await?;
                }
            }
        }
        Ok(ids)
    }

    pub async fn is_processed(&self, game_id: i64) -> Result<bool, MqError> {
        self.kv
            .set_contains(PROCESSED_KEY, &game_id.to_string())
            .await
    }

    /// Move `game_id` to the terminal processed set and drop its staged state.
    pub async fn mark_processed(&self, game_id: i64) -> Result<(), MqError> {
        let member = game_id.to_string();
        self.kv.set_add(PROCESSED_KEY, &[member.clone()]).await?;
        self.kv.set_remove(PENDING_KEY, &member).await?;
        self.kv.hash_delete(RELATIONSHIPS_KEY, &member).await?;
        self.kv.hash_delete(FETCH_ATTEMPTS_KEY, &member).await?;
        Ok(())
    }

    /// Dependency-fetch rounds already issued on behalf of `game_id`.
    pub async fn fetch_attempts(&self, game_id: i64) -> Result<u32, MqError> {
        let raw = self
            .kv
            .hash_get(FETCH_ATTEMPTS_KEY, &game_id.to_string())
            .await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    pub async fn record_fetch_attempt(&self, game_id: i64) -> Result<u32, MqError> {
        let attempts = self.fetch_attempts(game_id).await? + 1;
        self.kv
            .hash_set(FETCH_ATTEMPTS_KEY, &game_id.to_string(), &attempts.to_string())
            .await?;
        Ok(attempts)
    }

    pub async fn stats(&self) -> Result<SimilarGamesStats, MqError> {
        Ok(SimilarGamesStats {
            pending: self.kv.set_len(PENDING_KEY).await?,
            processed: self.kv.set_len(PROCESSED_KEY).await?,
            staged: self.kv.hash_len(RELATIONSHIPS_KEY).await?,
        })
    }
}
