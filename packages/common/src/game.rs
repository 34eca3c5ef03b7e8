//! Normalized game records exchanged between the upstream catalog client,
//! the job queue and the catalog writer.
//!
//! Every relation is an `Option`: `None` means "not present in this payload",
//! which update jobs rely on to leave stored relations untouched.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A game as returned by the upstream catalog, ready to be persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storyline: Option<String>,
    /// Unix timestamp (seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_release_date: Option<i64>,
    /// Upstream creation time, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rating: Option<f64>,
    /// Comma-joined keyword names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    /// Comma-joined company names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub involved_companies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<ImageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshots: Option<Vec<ImageRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websites: Option<Vec<WebsiteRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_modes: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_types: Option<Vec<GameTypeRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_games: Option<Vec<i64>>,
    #[serde(default)]
    pub is_popular: bool,
}

impl GameRecord {
    /// Similar-game ids with invalid ids, self references and duplicates removed.
    pub fn similar_ids(&self) -> Vec<i64> {
        sanitize_similar_ids(self.id, self.similar_games.iter().flatten().copied())
    }
}

/// Drop non-positive ids, `game_id` itself and repeats, keeping first-seen order.
pub fn sanitize_similar_ids(game_id: i64, ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|&id| id > 0 && id != game_id && seen.insert(id))
        .collect()
}

/// Cover art or screenshot, identified by its upstream image hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Website category name, e.g. "official" or "steam".
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted: Option<bool>,
}

/// A platform, genre or game mode reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

impl NamedRef {
    /// The upstream slug, or one derived from the name when the payload had none.
    pub fn slug_or_derived(&self) -> String {
        if !self.slug.trim().is_empty() {
            return self.slug.trim().to_string();
        }
        self.name
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTypeRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub type_name: String,
}
