//! Initial schema: modules, daily selections, the join table carrying
//! position and pool tag, and user ratings.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Modules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Modules::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Modules::Filename).string().not_null())
                    .col(ColumnDef::new(Modules::Title).string())
                    .col(ColumnDef::new(Modules::Artist).string())
                    .col(ColumnDef::new(Modules::Format).string())
                    .col(ColumnDef::new(Modules::Size).big_integer())
                    .col(ColumnDef::new(Modules::DownloadUrl).string().not_null())
                    .col(ColumnDef::new(Modules::ModarchiveUrl).string().not_null())
                    .col(ColumnDef::new(Modules::DateAdded).date())
                    .col(
                        ColumnDef::new(Modules::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DailySelections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailySelections::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DailySelections::Date)
                            .date()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(DailySelections::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SelectionModules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SelectionModules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SelectionModules::SelectionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SelectionModules::ModuleId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SelectionModules::Position)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SelectionModules::SourceType)
                            .string()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_selection_modules_selection")
                            .from(SelectionModules::Table, SelectionModules::SelectionId)
                            .to(DailySelections::Table, DailySelections::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_selection_modules_module")
                            .from(SelectionModules::Table, SelectionModules::ModuleId)
                            .to(Modules::Table, Modules::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserRatings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserRatings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserRatings::ModuleId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(UserRatings::Rating).integer().not_null())
                    .col(ColumnDef::new(UserRatings::Comment).text())
                    .col(
                        ColumnDef::new(UserRatings::RatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserRatings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_ratings_module")
                            .from(UserRatings::Table, UserRatings::ModuleId)
                            .to(Modules::Table, Modules::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_selection_modules_selection")
                    .table(SelectionModules::Table)
                    .col(SelectionModules::SelectionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_selection_modules_pair")
                    .table(SelectionModules::Table)
                    .col(SelectionModules::SelectionId)
                    .col(SelectionModules::ModuleId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_modules_format")
                    .table(Modules::Table)
                    .col(Modules::Format)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserRatings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SelectionModules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DailySelections::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Modules::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Modules {
    Table,
    Id,
    Filename,
    Title,
    Artist,
    Format,
    Size,
    DownloadUrl,
    ModarchiveUrl,
    DateAdded,
    FetchedAt,
}

#[derive(DeriveIden)]
enum DailySelections {
    Table,
    Id,
    Date,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SelectionModules {
    Table,
    Id,
    SelectionId,
    ModuleId,
    Position,
    SourceType,
}

#[derive(DeriveIden)]
enum UserRatings {
    Table,
    Id,
    ModuleId,
    Rating,
    Comment,
    RatedAt,
    UpdatedAt,
}
