use std::fmt;

use serde::{Deserialize, Serialize};

use super::game::GameResponse;

/// Query parameters for game search.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct SearchParams {
    /// Search text. Matched case-insensitively against game names.
    #[param(example = "zelda")]
    pub q: Option<String>,
    /// Page size (default 50).
    #[param(example = 50)]
    pub limit: Option<u64>,
    /// Rows to skip.
    #[param(example = 0)]
    pub offset: Option<u64>,
    /// `true` or `1` bypasses the result cache.
    #[param(example = "false")]
    pub fresh: Option<String>,
}

impl SearchParams {
    pub fn force_fresh(&self) -> bool {
        matches!(self.fresh.as_deref(), Some("true") | Some("1"))
    }
}

/// Which tier answered a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    /// Served from the result cache.
    Cache,
    /// Served from the catalog store.
    Database,
    /// Served from the upstream catalog.
    Igdb,
    /// Every tier was consulted and none had results.
    All,
    /// Nothing was consulted (invalid input).
    None,
}

impl SearchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSource::Cache => "cache",
            SearchSource::Database => "database",
            SearchSource::Igdb => "igdb",
            SearchSource::All => "all",
            SearchSource::None => "none",
        }
    }
}

impl fmt::Display for SearchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SearchMeta {
    #[schema(example = 3)]
    pub total: usize,
    pub source: SearchSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "fresh")]
    pub freshness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_time_ms: Option<u64>,
    /// Present and true when the answer came from another in-flight request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deduplicated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SearchResponse {
    pub results: Vec<GameResponse>,
    pub meta: SearchMeta,
}

impl SearchResponse {
    pub fn new(results: Vec<GameResponse>, source: SearchSource, query_time_ms: u64) -> Self {
        Self {
            meta: SearchMeta {
                total: results.len(),
                source,
                freshness: Some("fresh".into()),
                query_time_ms: Some(query_time_ms),
                deduplicated: None,
                error: None,
            },
            results,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            meta: SearchMeta {
                total: 0,
                source: SearchSource::None,
                freshness: None,
                query_time_ms: None,
                deduplicated: None,
                error: Some(message.into()),
            },
        }
    }
}

/// Cached search result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSearch {
    pub results: Vec<GameResponse>,
    /// Unix milliseconds when the entry was written.
    pub timestamp: i64,
}
