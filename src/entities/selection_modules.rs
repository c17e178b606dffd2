//! `selection_modules` join entity: positioned items within a selection

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "selection_modules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub selection_id: i32,
    pub module_id: i64,
    /// 1-based presentation order within the selection
    pub position: i32,
    /// Which candidate pool produced the pick (recent/rated/random)
    pub source_type: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::daily_selections::Entity",
        from = "Column::SelectionId",
        to = "super::daily_selections::Column::Id"
    )]
    DailySelection,
    #[sea_orm(
        belongs_to = "super::modules::Entity",
        from = "Column::ModuleId",
        to = "super::modules::Column::Id"
    )]
    Module,
}

impl Related<super::daily_selections::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DailySelection.def()
    }
}

impl Related<super::modules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Module.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
