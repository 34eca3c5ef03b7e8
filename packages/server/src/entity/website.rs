use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "website")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub game_id: i64,
    #[sea_orm(belongs_to, from = "game_id", to = "id")]
    pub game: HasOne<super::game::Entity>,

    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub trusted: Option<bool>,
    /// References `website_type.id`.
    pub type_id: Option<i32>,
}

impl ActiveModelBehavior for ActiveModel {}
