use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "game")]
pub struct Model {
    /// Upstream (IGDB) id; the natural key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    #[sea_orm(indexed)]
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub summary: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub storyline: Option<String>,
    /// Unix seconds.
    pub first_release_date: Option<i64>,
    pub total_rating: Option<f64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub involved_companies: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub keywords: Option<String>,
    #[sea_orm(default_value = false)]
    pub is_popular: bool,

    #[sea_orm(has_one)]
    pub cover: HasOne<super::cover::Entity>,
    #[sea_orm(has_many)]
    pub screenshots: HasMany<super::screenshot::Entity>,
    #[sea_orm(has_many)]
    pub websites: HasMany<super::website::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
