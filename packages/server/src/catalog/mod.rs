//! Relational catalog of games, their media and lookup tables.

mod loader;
mod lookup;

use std::collections::HashSet;

use chrono::Utc;
use common::{GameRecord, ImageRecord, NamedRef, WebsiteRecord};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{ExprTrait, Func, LikeExpr, NullOrdering, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entity::{
    cover, game, game_to_game_mode, game_to_genre, game_to_platform, game_to_similar_game,
    game_to_type, screenshot, website,
};

/// Image source recorded for media fetched from the upstream catalog.
pub const IMAGE_SOURCE_IGDB: &str = "igdb";

/// Treat "nothing inserted" from `ON CONFLICT DO NOTHING` as success.
pub(crate) fn inserted(result: Result<u64, DbErr>) -> Result<bool, DbErr> {
    match result {
        Ok(rows) => Ok(rows > 0),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Catalog reads and writes over any connection.
///
/// Multi-row writes (`insert_game`, `update_game`) expect a transaction.
pub struct CatalogStore<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> CatalogStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find_game(&self, id: i64) -> Result<Option<game::Model>, DbErr> {
        game::Entity::find_by_id(id).one(self.conn).await
    }

    pub async fn game_exists(&self, id: i64) -> Result<bool, DbErr> {
        Ok(!self.existing_ids(&[id]).await?.is_empty())
    }

    /// The subset of `ids` already stored.
    pub async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DbErr> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let found: Vec<i64> = game::Entity::find()
            .select_only()
            .column(game::Column::Id)
            .filter(game::Column::Id.is_in(ids.to_vec()))
            .into_tuple()
            .all(self.conn)
            .await?;
        Ok(found.into_iter().collect())
    }

    /// Insert a game and all of its relations.
    ///
    /// Returns `false` without touching anything when the id already exists.
    pub async fn insert_game(&self, record: &GameRecord) -> Result<bool, DbErr> {
        let now = Utc::now();
        let model = game::ActiveModel {
            id: Set(record.id),
            name: Set(record.name.clone()),
            slug: Set(record.slug.clone()),
            summary: Set(record.summary.clone()),
            storyline: Set(record.storyline.clone()),
            first_release_date: Set(record.first_release_date),
            total_rating: Set(record.total_rating),
            involved_companies: Set(record.involved_companies.clone()),
            keywords: Set(record.keywords.clone()),
            is_popular: Set(record.is_popular),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = inserted(
            game::Entity::insert(model)
                .on_conflict(OnConflict::column(game::Column::Id).do_nothing().to_owned())
                .exec_without_returning(self.conn)
                .await,
        )?;
        if !created {
            return Ok(false);
        }

        if let Some(image) = &record.cover {
            self.upsert_cover(record.id, image).await?;
        }
        self.insert_screenshots(record.id, record.screenshots.as_deref().unwrap_or_default())
            .await?;
        self.insert_websites(record.id, record.websites.as_deref().unwrap_or_default())
            .await?;
        self.link_platforms(record.id, record.platforms.as_deref().unwrap_or_default())
            .await?;
        self.link_genres(record.id, record.genres.as_deref().unwrap_or_default())
            .await?;
        self.link_game_modes(record.id, record.game_modes.as_deref().unwrap_or_default())
            .await?;
        self.link_game_types(record).await?;

        Ok(true)
    }

    /// Overwrite scalar fields and replace only the relations present in `record`.
    ///
    /// Returns `false` when the game does not exist.
    pub async fn update_game(&self, record: &GameRecord) -> Result<bool, DbErr> {
        let Some(existing) = self.find_game(record.id).await? else {
            return Ok(false);
        };

        let mut model: game::ActiveModel = existing.into();
        model.name = Set(record.name.clone());
        model.slug = Set(record.slug.clone());
        if record.summary.is_some() {
            model.summary = Set(record.summary.clone());
        }
        if record.storyline.is_some() {
            model.storyline = Set(record.storyline.clone());
        }
        if record.first_release_date.is_some() {
            model.first_release_date = Set(record.first_release_date);
        }
        if record.total_rating.is_some() {
            model.total_rating = Set(record.total_rating);
        }
        if record.involved_companies.is_some() {
            model.involved_companies = Set(record.involved_companies.clone());
        }
        if record.keywords.is_some() {
            model.keywords = Set(record.keywords.clone());
        }
        model.is_popular = Set(record.is_popular);
        model.updated_at = Set(Utc::now());
        model.update(self.conn).await?;

        if let Some(image) = &record.cover {
            self.upsert_cover(record.id, image).await?;
        }
        if let Some(screenshots) = &record.screenshots {
            screenshot::Entity::delete_many()
                .filter(screenshot::Column::GameId.eq(record.id))
                .exec(self.conn)
                .await?;
            self.insert_screenshots(record.id, screenshots).await?;
        }
        if let Some(websites) = &record.websites {
            website::Entity::delete_many()
                .filter(website::Column::GameId.eq(record.id))
                .exec(self.conn)
                .await?;
            self.insert_websites(record.id, websites).await?;
        }
        if let Some(platforms) = &record.platforms {
            game_to_platform::Entity::delete_many()
                .filter(game_to_platform::Column::GameId.eq(record.id))
                .exec(self.conn)
                .await?;
            self.link_platforms(record.id, platforms).await?;
        }
        if let Some(genres) = &record.genres {
            game_to_genre::Entity::delete_many()
                .filter(game_to_genre::Column::GameId.eq(record.id))
                .exec(self.conn)
                .await?;
            self.link_genres(record.id, genres).await?;
        }
        if let Some(game_modes) = &record.game_modes {
            game_to_game_mode::Entity::delete_many()
                .filter(game_to_game_mode::Column::GameId.eq(record.id))
                .exec(self.conn)
                .await?;
            self.link_game_modes(record.id, game_modes).await?;
        }
        if record.game_types.is_some() {
            game_to_type::Entity::delete_many()
                .filter(game_to_type::Column::GameId.eq(record.id))
                .exec(self.conn)
                .await?;
            self.link_game_types(record).await?;
        }

        Ok(true)
    }

    async fn upsert_cover(&self, game_id: i64, image: &ImageRecord) -> Result<(), DbErr> {
        let existing = cover::Entity::find()
            .filter(cover::Column::GameId.eq(game_id))
            .one(self.conn)
            .await?;

        match existing {
            Some(existing) => {
                let mut model: cover::ActiveModel = existing.into();
                model.hash = Set(image.hash.clone());
                model.source = Set(IMAGE_SOURCE_IGDB.into());
                model.width = Set(image.width);
                model.height = Set(image.height);
                model.update(self.conn).await?;
            }
            None => {
                cover::ActiveModel {
                    game_id: Set(game_id),
                    hash: Set(image.hash.clone()),
                    source: Set(IMAGE_SOURCE_IGDB.into()),
                    width: Set(image.width),
                    height: Set(image.height),
                    ..Default::default()
                }
                .insert(self.conn)
                .await?;
            }
        }
        Ok(())
    }

    async fn insert_screenshots(&self, game_id: i64, images: &[ImageRecord]) -> Result<(), DbErr> {
        for image in images {
            screenshot::ActiveModel {
                game_id: Set(game_id),
                hash: Set(image.hash.clone()),
                source: Set(IMAGE_SOURCE_IGDB.into()),
                width: Set(image.width),
                height: Set(image.height),
                ..Default::default()
            }
            .insert(self.conn)
            .await?;
        }
        Ok(())
    }

    async fn insert_websites(&self, game_id: i64, sites: &[WebsiteRecord]) -> Result<(), DbErr> {
        for site in sites {
            let type_id = match site.type_name.as_deref().filter(|t| !t.trim().is_empty()) {
                Some(type_name) => Some(self.website_type_id(type_name).await?),
                None => None,
            };
            website::ActiveModel {
                game_id: Set(game_id),
                url: Set(site.url.clone()),
                trusted: Set(site.trusted),
                type_id: Set(type_id),
                ..Default::default()
            }
            .insert(self.conn)
            .await?;
        }
        Ok(())
    }

    async fn link_platforms(&self, game_id: i64, platforms: &[NamedRef]) -> Result<(), DbErr> {
        for named in platforms {
            let platform_id = self.platform_id(named).await?;
            let link = game_to_platform::ActiveModel {
                game_id: Set(game_id),
                platform_id: Set(platform_id),
                ..Default::default()
            };
            inserted(
                game_to_platform::Entity::insert(link)
                    .on_conflict(
                        OnConflict::columns([
                            game_to_platform::Column::GameId,
                            game_to_platform::Column::PlatformId,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(self.conn)
                    .await,
            )?;
        }
        Ok(())
    }

    async fn link_genres(&self, game_id: i64, genres: &[NamedRef]) -> Result<(), DbErr> {
        for named in genres {
            let genre_id = self.genre_id(named).await?;
            let link = game_to_genre::ActiveModel {
                game_id: Set(game_id),
                genre_id: Set(genre_id),
                ..Default::default()
            };
            inserted(
                game_to_genre::Entity::insert(link)
                    .on_conflict(
                        OnConflict::columns([
                            game_to_genre::Column::GameId,
                            game_to_genre::Column::GenreId,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(self.conn)
                    .await,
            )?;
        }
        Ok(())
    }

    async fn link_game_modes(&self, game_id: i64, modes: &[NamedRef]) -> Result<(), DbErr> {
        for named in modes {
            let game_mode_id = self.game_mode_id(named).await?;
            let link = game_to_game_mode::ActiveModel {
                game_id: Set(game_id),
                game_mode_id: Set(game_mode_id),
                ..Default::default()
            };
            inserted(
                game_to_game_mode::Entity::insert(link)
                    .on_conflict(
                        OnConflict::columns([
                            game_to_game_mode::Column::GameId,
                            game_to_game_mode::Column::GameModeId,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(self.conn)
                    .await,
            )?;
        }
        Ok(())
    }

    async fn link_game_types(&self, record: &GameRecord) -> Result<(), DbErr> {
        let types = record.game_types.as_deref().unwrap_or_default();
        for game_type in types.iter().filter(|t| !t.type_name.trim().is_empty()) {
            let type_id = self.game_type_id(game_type).await?;
            let link = game_to_type::ActiveModel {
                game_id: Set(record.id),
                type_id: Set(type_id),
                ..Default::default()
            };
            inserted(
                game_to_type::Entity::insert(link)
                    .on_conflict(
                        OnConflict::columns([
                            game_to_type::Column::GameId,
                            game_to_type::Column::TypeId,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(self.conn)
                    .await,
            )?;
        }
        Ok(())
    }

    /// Case-insensitive substring search on game names, excluding `exclude`.
    /// Popular games first, then by rating (unrated last).
    pub async fn search_by_name(
        &self,
        term: &str,
        exclude: &[i64],
        limit: u64,
        offset: u64,
    ) -> Result<Vec<game::Model>, DbErr> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));

        let mut query = game::Entity::find().filter(
            Expr::expr(Func::lower(Expr::col(game::Column::Name)))
                .like(LikeExpr::new(pattern).escape('\\')),
        );
        if !exclude.is_empty() {
            query = query.filter(game::Column::Id.is_not_in(exclude.to_vec()));
        }

        query
            .order_by_desc(game::Column::IsPopular)
            .order_by_with_nulls(game::Column::TotalRating, Order::Desc, NullOrdering::Last)
            .order_by_asc(game::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.conn)
            .await
    }

    /// Ids that already have an outgoing similarity edge from `game_id`.
    pub async fn similar_ids_with_edges(&self, game_id: i64) -> Result<HashSet<i64>, DbErr> {
        let targets: Vec<i64> = game_to_similar_game::Entity::find()
            .select_only()
            .column(game_to_similar_game::Column::SimilarGameId)
            .filter(game_to_similar_game::Column::GameId.eq(game_id))
            .into_tuple()
            .all(self.conn)
            .await?;
        Ok(targets.into_iter().collect())
    }

    /// Write `game_id <-> id` edges for each id; existing edges are left alone.
    /// Returns the number of directed edges created.
    pub async fn insert_similar_edges(&self, game_id: i64, ids: &[i64]) -> Result<u64, DbErr> {
        let now = Utc::now();
        let mut created = 0;
        for &other in ids.iter().filter(|&&id| id != game_id) {
            for (from, to) in [(game_id, other), (other, game_id)] {
                let edge = game_to_similar_game::ActiveModel {
                    game_id: Set(from),
                    similar_game_id: Set(to),
                    created_at: Set(now),
                    ..Default::default()
                };
                let was_inserted = inserted(
                    game_to_similar_game::Entity::insert(edge)
                        .on_conflict(
                            OnConflict::columns([
                                game_to_similar_game::Column::GameId,
                                game_to_similar_game::Column::SimilarGameId,
                            ])
                            .do_nothing()
                            .to_owned(),
                        )
                        .exec_without_returning(self.conn)
                        .await,
                )?;
                if was_inserted {
                    created += 1;
                }
            }
        }
        Ok(created)
    }
}

pub fn catalog_store(db: &DatabaseConnection) -> CatalogStore<'_, DatabaseConnection> {
    CatalogStore::new(db)
}
