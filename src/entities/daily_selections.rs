//! `daily_selections` entity: one committed selection per calendar date

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "daily_selections")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub date: Date,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::selection_modules::Entity")]
    SelectionModules,
}

impl Related<super::selection_modules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SelectionModules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
