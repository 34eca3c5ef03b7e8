//! IGDB `/games` response shapes and their normalization into [`GameRecord`].

use common::{GameRecord, GameTypeRef, ImageRecord, NamedRef, WebsiteRecord};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct IgdbGame {
    pub id: i64,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub summary: Option<String>,
    pub storyline: Option<String>,
    pub created_at: Option<i64>,
    pub first_release_date: Option<i64>,
    pub total_rating: Option<f64>,
    pub cover: Option<IgdbImage>,
    #[serde(default)]
    pub screenshots: Vec<IgdbImage>,
    #[serde(default)]
    pub websites: Vec<IgdbWebsite>,
    #[serde(default)]
    pub genres: Vec<IgdbNamed>,
    #[serde(default)]
    pub platforms: Vec<IgdbNamed>,
    #[serde(default)]
    pub game_modes: Vec<IgdbNamed>,
    #[serde(default)]
    pub keywords: Vec<IgdbNamed>,
    #[serde(default)]
    pub involved_companies: Vec<IgdbInvolvedCompany>,
    pub similar_games: Option<Vec<i64>>,
    pub game_type: Option<IgdbGameType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgdbImage {
    pub id: Option<i64>,
    pub image_id: Option<String>,
    pub url: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl IgdbImage {
    /// The image hash, from `image_id` or else the file stem of `url`.
    fn hash(&self) -> Option<String> {
        if let Some(id) = self.image_id.as_deref().filter(|id| !id.is_empty()) {
            return Some(id.to_string());
        }
        let file = self.url.as_deref()?.rsplit('/').next()?;
        let stem = file.split('.').next()?;
        (!stem.is_empty()).then(|| stem.to_string())
    }

    fn into_record(self) -> Option<ImageRecord> {
        Some(ImageRecord {
            hash: self.hash()?,
            id: self.id,
            width: self.width,
            height: self.height,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgdbWebsite {
    pub id: Option<i64>,
    pub url: Option<String>,
    pub trusted: Option<bool>,
    #[serde(rename = "type")]
    pub kind: Option<IgdbWebsiteKind>,
}

/// Website type, either expanded or as a bare id.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IgdbWebsiteKind {
    Expanded {
        #[serde(rename = "type")]
        type_name: Option<String>,
    },
    Name(String),
    Id(i64),
}

impl IgdbWebsiteKind {
    fn name(self) -> Option<String> {
        match self {
            IgdbWebsiteKind::Expanded { type_name } => type_name,
            IgdbWebsiteKind::Name(name) => Some(name),
            IgdbWebsiteKind::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgdbNamed {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub slug: Option<String>,
}

impl IgdbNamed {
    fn into_ref(self) -> Option<NamedRef> {
        Some(NamedRef {
            id: self.id,
            name: self.name?,
            slug: self.slug.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgdbInvolvedCompany {
    pub company: Option<IgdbNamed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgdbGameType {
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
}

fn join_names(names: impl Iterator<Item = String>) -> Option<String> {
    let joined = names.collect::<Vec<_>>().join(", ");
    (!joined.is_empty()).then_some(joined)
}

impl From<IgdbGame> for GameRecord {
    fn from(game: IgdbGame) -> Self {
        let name = game.name.unwrap_or_default();
        let slug = game
            .slug
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("game-{}", game.id));

        GameRecord {
            id: game.id,
            name,
            slug,
            summary: game.summary,
            storyline: game.storyline,
            first_release_date: game.first_release_date,
            created_at: game.created_at,
            total_rating: game.total_rating,
            keywords: join_names(game.keywords.into_iter().filter_map(|k| k.name)),
            involved_companies: join_names(
                game.involved_companies
                    .into_iter()
                    .filter_map(|c| c.company.and_then(|c| c.name)),
            ),
            cover: game.cover.and_then(IgdbImage::into_record),
            screenshots: Some(
                game.screenshots
                    .into_iter()
                    .filter_map(IgdbImage::into_record)
                    .collect(),
            ),
            websites: Some(
                game.websites
                    .into_iter()
                    .filter_map(|w| {
                        Some(WebsiteRecord {
                            id: w.id,
                            url: w.url?,
                            trusted: w.trusted,
                            type_name: w.kind.and_then(IgdbWebsiteKind::name),
                        })
                    })
                    .collect(),
            ),
            platforms: Some(game.platforms.into_iter().filter_map(IgdbNamed::into_ref).collect()),
            genres: Some(game.genres.into_iter().filter_map(IgdbNamed::into_ref).collect()),
            game_modes: Some(
                game.game_modes
                    .into_iter()
                    .filter_map(IgdbNamed::into_ref)
                    .collect(),
            ),
            game_types: Some(
                game.game_type
                    .and_then(|t| {
                        Some(GameTypeRef {
                            id: t.id,
                            type_name: t.type_name?,
                        })
                    })
                    .into_iter()
                    .collect(),
            ),
            similar_games: game.similar_games,
            is_popular: false,
        }
    }
}
