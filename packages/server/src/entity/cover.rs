use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cover")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub game_id: i64,
    #[sea_orm(belongs_to, from = "game_id", to = "id")]
    pub game: HasOne<super::game::Entity>,

    /// Upstream image hash.
    pub hash: String,
    /// "igdb" or "local".
    pub source: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl ActiveModelBehavior for ActiveModel {}
