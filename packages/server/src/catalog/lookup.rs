//! Find-or-create for lookup rows keyed by slug or type name.
//!
//! A racing writer can insert the same key between our read and insert; the
//! unique constraint plus `ON CONFLICT DO NOTHING` and a re-read make that
//! harmless.

use common::{GameTypeRef, NamedRef};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityName, EntityTrait, QueryFilter,
    Set,
};

use super::{CatalogStore, inserted};
use crate::entity::{game_mode, game_type, genre, platform, website_type};

impl<C: ConnectionTrait> CatalogStore<'_, C> {
    pub async fn platform_id(&self, named: &NamedRef) -> Result<i32, DbErr> {
        let slug = named.slug_or_derived();
        let row = platform::ActiveModel {
            name: Set(named.name.clone()),
            slug: Set(slug.clone()),
            ..Default::default()
        };
        self.find_or_create::<platform::Entity>(platform::Column::Slug, &slug, row, |m| m.id)
            .await
    }

    pub async fn genre_id(&self, named: &NamedRef) -> Result<i32, DbErr> {
        let slug = named.slug_or_derived();
        let row = genre::ActiveModel {
            name: Set(named.name.clone()),
            slug: Set(slug.clone()),
            ..Default::default()
        };
        self.find_or_create::<genre::Entity>(genre::Column::Slug, &slug, row, |m| m.id)
            .await
    }

    pub async fn game_mode_id(&self, named: &NamedRef) -> Result<i32, DbErr> {
        let slug = named.slug_or_derived();
        let row = game_mode::ActiveModel {
            name: Set(named.name.clone()),
            slug: Set(slug.clone()),
            ..Default::default()
        };
        self.find_or_create::<game_mode::Entity>(game_mode::Column::Slug, &slug, row, |m| m.id)
            .await
    }

    pub async fn game_type_id(&self, game_type: &GameTypeRef) -> Result<i32, DbErr> {
        let type_name = game_type.type_name.trim().to_string();
        let row = game_type::ActiveModel {
            type_name: Set(type_name.clone()),
            ..Default::default()
        };
        self.find_or_create::<game_type::Entity>(
            game_type::Column::TypeName,
            &type_name,
            row,
            |m| m.id,
        )
        .await
    }

    pub async fn website_type_id(&self, type_name: &str) -> Result<i32, DbErr> {
        let type_name = type_name.trim().to_string();
        let row = website_type::ActiveModel {
            type_name: Set(type_name.clone()),
            ..Default::default()
        };
        self.find_or_create::<website_type::Entity>(
            website_type::Column::TypeName,
            &type_name,
            row,
            |m| m.id,
        )
        .await
    }

    async fn find_or_create<E>(
        &self,
        key_column: E::Column,
        key: &str,
        row: E::ActiveModel,
        id: fn(&E::Model) -> i32,
    ) -> Result<i32, DbErr>
    where
        E: EntityTrait,
        E::Model: Send + Sync,
        E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    {
        if let Some(existing) = self.find_by_key::<E>(key_column, key).await? {
            return Ok(id(&existing));
        }
        self.create_or_reuse::<E>(key_column, key, row, id).await
    }

    /// Insert `row` unless another writer already holds `key`, then return
    /// the id of whichever row is stored.
    async fn create_or_reuse<E>(
        &self,
        key_column: E::Column,
        key: &str,
        row: E::ActiveModel,
        id: fn(&E::Model) -> i32,
    ) -> Result<i32, DbErr>
    where
        E: EntityTrait,
        E::Model: Send + Sync,
        E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    {
        inserted(
            E::insert(row)
                .on_conflict(OnConflict::column(key_column).do_nothing().to_owned())
                .exec_without_returning(self.conn)
                .await,
        )?;

        self.find_by_key::<E>(key_column, key)
            .await?
            .map(|m| id(&m))
            .ok_or_else(|| {
                DbErr::RecordNotFound(format!("{} '{key}'", E::default().table_name()))
            })
    }

    async fn find_by_key<E>(
        &self,
        key_column: E::Column,
        key: &str,
    ) -> Result<Option<E::Model>, DbErr>
    where
        E: EntityTrait,
        E::Model: Send + Sync,
    {
        E::find().filter(key_column.eq(key)).one(self.conn).await
    }
}
