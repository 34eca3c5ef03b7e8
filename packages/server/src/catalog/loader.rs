//! Batch loading of game relations into API responses.

use std::collections::HashMap;

use common::ImageSize;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};

use super::CatalogStore;
use crate::entity::{
    cover, game, game_mode, game_to_game_mode, game_to_genre, game_to_platform,
    game_to_similar_game, game_to_type, game_type, genre, platform, screenshot, website,
    website_type,
};
use crate::models::game::{GameResponse, ImageResponse, NamedResponse, WebsiteResponse};

/// Group `(game_id, lookup_id)` links into per-game lists of resolved lookups.
fn group_links<T: Clone>(
    links: impl IntoIterator<Item = (i64, i32)>,
    lookup: &HashMap<i32, T>,
) -> HashMap<i64, Vec<T>> {
    let mut grouped: HashMap<i64, Vec<T>> = HashMap::new();
    for (game_id, lookup_id) in links {
        if let Some(value) = lookup.get(&lookup_id) {
            grouped.entry(game_id).or_default().push(value.clone());
        }
    }
    grouped
}

impl<C: ConnectionTrait> CatalogStore<'_, C> {
    /// Attach media, lookups and similarity edges to `games`, keeping their order.
    pub async fn load_responses(
        &self,
        games: Vec<game::Model>,
    ) -> Result<Vec<GameResponse>, DbErr> {
        if games.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = games.iter().map(|g| g.id).collect();

        let mut covers: HashMap<i64, ImageResponse> = cover::Entity::find()
            .filter(cover::Column::GameId.is_in(ids.clone()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|c| {
                let image = ImageResponse::new(&c.hash, c.width, c.height, ImageSize::CoverBig);
                (c.game_id, image)
            })
            .collect();

        let mut screenshots: HashMap<i64, Vec<ImageResponse>> = HashMap::new();
        for s in screenshot::Entity::find()
            .filter(screenshot::Column::GameId.is_in(ids.clone()))
            .order_by_asc(screenshot::Column::Id)
            .all(self.conn)
            .await?
        {
            screenshots.entry(s.game_id).or_default().push(ImageResponse::new(
                &s.hash,
                s.width,
                s.height,
                ImageSize::ScreenshotBig,
            ));
        }

        let mut websites = self.load_websites(&ids).await?;
        let mut platforms = self.load_platforms(&ids).await?;
        let mut genres = self.load_genres(&ids).await?;
        let mut game_modes = self.load_game_modes(&ids).await?;
        let mut game_types = self.load_game_types(&ids).await?;

        let mut similar: HashMap<i64, Vec<i64>> = HashMap::new();
        for edge in game_to_similar_game::Entity::find()
            .filter(game_to_similar_game::Column::GameId.is_in(ids.clone()))
            .order_by_asc(game_to_similar_game::Column::SimilarGameId)
            .all(self.conn)
            .await?
        {
            similar
                .entry(edge.game_id)
                .or_default()
                .push(edge.similar_game_id);
        }

        Ok(games
            .into_iter()
            .map(|g| GameResponse {
                cover: covers.remove(&g.id),
                screenshots: screenshots.remove(&g.id).unwrap_or_default(),
                websites: websites.remove(&g.id).unwrap_or_default(),
                platforms: platforms.remove(&g.id).unwrap_or_default(),
                genres: genres.remove(&g.id).unwrap_or_default(),
                game_modes: game_modes.remove(&g.id).unwrap_or_default(),
                game_types: game_types.remove(&g.id).unwrap_or_default(),
                similar_games: similar.remove(&g.id).unwrap_or_default(),
                id: g.id,
                name: g.name,
                slug: g.slug,
                summary: g.summary,
                storyline: g.storyline,
                first_release_date: g.first_release_date,
                total_rating: g.total_rating,
                keywords: g.keywords,
                involved_companies: g.involved_companies,
                is_popular: g.is_popular,
            })
            .collect())
    }

    async fn load_websites(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<WebsiteResponse>>, DbErr> {
        let sites = website::Entity::find()
            .filter(website::Column::GameId.is_in(ids.to_vec()))
            .order_by_asc(website::Column::Id)
            .all(self.conn)
            .await?;

        let type_ids: Vec<i32> = sites.iter().filter_map(|s| s.type_id).collect();
        let type_names: HashMap<i32, String> = if type_ids.is_empty() {
            HashMap::new()
        } else {
            website_type::Entity::find()
                .filter(website_type::Column::Id.is_in(type_ids))
                .all(self.conn)
                .await?
                .into_iter()
                .map(|t| (t.id, t.type_name))
                .collect()
        };

        let mut grouped: HashMap<i64, Vec<WebsiteResponse>> = HashMap::new();
        for site in sites {
            grouped.entry(site.game_id).or_default().push(WebsiteResponse {
                type_name: site.type_id.and_then(|id| type_names.get(&id).cloned()),
                url: site.url,
                trusted: site.trusted,
            });
        }
        Ok(grouped)
    }

    async fn load_platforms(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<NamedResponse>>, DbErr> {
        let links: Vec<(i64, i32)> = game_to_platform::Entity::find()
            .filter(game_to_platform::Column::GameId.is_in(ids.to_vec()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|l| (l.game_id, l.platform_id))
            .collect();
        let lookup: HashMap<i32, NamedResponse> = platform::Entity::find()
            .filter(platform::Column::Id.is_in(links.iter().map(|l| l.1).collect::<Vec<_>>()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|p| (p.id, NamedResponse { name: p.name, slug: p.slug }))
            .collect();
        Ok(group_links(links, &lookup))
    }

    async fn load_genres(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<NamedResponse>>, DbErr> {
        let links: Vec<(i64, i32)> = game_to_genre::Entity::find()
            .filter(game_to_genre::Column::GameId.is_in(ids.to_vec()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|l| (l.game_id, l.genre_id))
            .collect();
        let lookup: HashMap<i32, NamedResponse> = genre::Entity::find()
            .filter(genre::Column::Id.is_in(links.iter().map(|l| l.1).collect::<Vec<_>>()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|g| (g.id, NamedResponse { name: g.name, slug: g.slug }))
            .collect();
        Ok(group_links(links, &lookup))
    }

    async fn load_game_modes(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<NamedResponse>>, DbErr> {
        let links: Vec<(i64, i32)> = game_to_game_mode::Entity::find()
            .filter(game_to_game_mode::Column::GameId.is_in(ids.to_vec()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|l| (l.game_id, l.game_mode_id))
            .collect();
        let lookup: HashMap<i32, NamedResponse> = game_mode::Entity::find()
            .filter(game_mode::Column::Id.is_in(links.iter().map(|l| l.1).collect::<Vec<_>>()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|m| (m.id, NamedResponse { name: m.name, slug: m.slug }))
            .collect();
        Ok(group_links(links, &lookup))
    }

    async fn load_game_types(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<String>>, DbErr> {
        let links: Vec<(i64, i32)> = game_to_type::Entity::find()
            .filter(game_to_type::Column::GameId.is_in(ids.to_vec()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|l| (l.game_id, l.type_id))
            .collect();
        let lookup: HashMap<i32, String> = game_type::Entity::find()
            .filter(game_type::Column::Id.is_in(links.iter().map(|l| l.1).collect::<Vec<_>>()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|t| (t.id, t.type_name))
            .collect();
        Ok(group_links(links, &lookup))
    }
}
