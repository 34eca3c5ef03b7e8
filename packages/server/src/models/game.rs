use common::{GameRecord, ImageRecord, ImageSize, image_url};
use serde::{Deserialize, Serialize};

/// A game as returned by search, whichever tier produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GameResponse {
    #[schema(example = 1025)]
    pub id: i64,
    #[schema(example = "Zelda II: The Adventure of Link")]
    pub name: String,
    #[schema(example = "zelda-ii-the-adventure-of-link")]
    pub slug: String,
    pub summary: Option<String>,
    pub storyline: Option<String>,
    /// Unix seconds.
    pub first_release_date: Option<i64>,
    pub total_rating: Option<f64>,
    pub keywords: Option<String>,
    pub involved_companies: Option<String>,
    pub is_popular: bool,
    pub cover: Option<ImageResponse>,
    pub screenshots: Vec<ImageResponse>,
    pub websites: Vec<WebsiteResponse>,
    pub platforms: Vec<NamedResponse>,
    pub genres: Vec<NamedResponse>,
    pub game_modes: Vec<NamedResponse>,
    pub game_types: Vec<String>,
    /// Ids of games linked as similar (store) or reported as similar (upstream).
    pub similar_games: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ImageResponse {
    #[schema(example = "co1uii")]
    pub hash: String,
    #[schema(example = "https://images.igdb.com/igdb/image/upload/t_cover_big/co1uii.jpg")]
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl ImageResponse {
    pub fn new(hash: &str, width: Option<i32>, height: Option<i32>, size: ImageSize) -> Self {
        Self {
            hash: hash.to_string(),
            url: image_url(hash, size),
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WebsiteResponse {
    pub url: String,
    pub trusted: Option<bool>,
    #[serde(rename = "type")]
    #[schema(example = "official")]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NamedResponse {
    pub name: String,
    pub slug: String,
}

fn image(record: &ImageRecord, size: ImageSize) -> ImageResponse {
    ImageResponse::new(&record.hash, record.width, record.height, size)
}

impl From<&GameRecord> for GameResponse {
    fn from(record: &GameRecord) -> Self {
        let named = |list: &Option<Vec<common::NamedRef>>| -> Vec<NamedResponse> {
            list.iter()
                .flatten()
                .map(|n| NamedResponse {
                    name: n.name.clone(),
                    slug: n.slug_or_derived(),
                })
                .collect()
        };

        Self {
            id: record.id,
            name: record.name.clone(),
            slug: record.slug.clone(),
            summary: record.summary.clone(),
            storyline: record.storyline.clone(),
            first_release_date: record.first_release_date,
            total_rating: record.total_rating,
            keywords: record.keywords.clone(),
            involved_companies: record.involved_companies.clone(),
            is_popular: record.is_popular,
            cover: record.cover.as_ref().map(|c| image(c, ImageSize::CoverBig)),
            screenshots: record
                .screenshots
                .iter()
                .flatten()
                .map(|s| image(s, ImageSize::ScreenshotBig))
                .collect(),
            websites: record
                .websites
                .iter()
                .flatten()
                .map(|w| WebsiteResponse {
                    url: w.url.clone(),
                    trusted: w.trusted,
                    type_name: w.type_name.clone(),
                })
                .collect(),
            platforms: named(&record.platforms),
            genres: named(&record.genres),
            game_modes: named(&record.game_modes),
            game_types: record
                .game_types
                .iter()
                .flatten()
                .map(|t| t.type_name.clone())
                .collect(),
            similar_games: record.similar_ids(),
        }
    }
}
