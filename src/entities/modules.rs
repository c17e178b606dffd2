//! `modules` entity: one catalog item per Mod Archive module id

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "modules")]
pub struct Model {
    /// Mod Archive module id, assigned by the source
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub filename: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub format: Option<String>,
    pub size: Option<i64>,
    pub download_url: String,
    pub modarchive_url: String,
    pub date_added: Option<Date>,
    pub fetched_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::selection_modules::Entity")]
    SelectionModules,
    #[sea_orm(has_many = "super::user_ratings::Entity")]
    UserRatings,
}

impl Related<super::selection_modules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SelectionModules.def()
    }
}

impl Related<super::user_ratings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserRatings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
