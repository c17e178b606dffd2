//! SeaORM-based selection history repository

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::entities::{
    daily_selections, modules, prelude::*, selection_modules,
};
use crate::errors::{StoreError, StoreResult};
use crate::models::{CatalogItem, Selection, SelectionEntry, SourceType};

use super::traits::SelectionHistoryStore;

/// SeaORM-backed store for committed daily selections
#[derive(Clone)]
pub struct SelectionSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl SelectionSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    fn module_id_from_db(id: i64) -> StoreResult<u32> {
        u32::try_from(id).map_err(|_| StoreError::Database {
            message: format!("module id {id} out of range"),
        })
    }

    fn model_to_item(model: modules::Model) -> StoreResult<CatalogItem> {
        Ok(CatalogItem {
            id: Self::module_id_from_db(model.id)?,
            filename: model.filename,
            title: model.title,
            artist: model.artist,
            format: model.format,
            size: model.size,
            download_url: model.download_url,
            modarchive_url: model.modarchive_url,
            date_added: model.date_added,
            fetched_at: model.fetched_at,
        })
    }

    /// Load the ordered entries belonging to one selection row.
    async fn load_selection(&self, row: daily_selections::Model) -> StoreResult<Selection> {
        let links = SelectionModules::find()
            .filter(selection_modules::Column::SelectionId.eq(row.id))
            .order_by_asc(selection_modules::Column::Position)
            .all(&*self.connection)
            .await?;

        let module_ids: Vec<i64> = links.iter().map(|l| l.module_id).collect();
        let module_rows = Modules::find()
            .filter(modules::Column::Id.is_in(module_ids))
            .all(&*self.connection)
            .await?;
        let mut by_id: HashMap<i64, modules::Model> =
            module_rows.into_iter().map(|m| (m.id, m)).collect();

        let mut entries = Vec::with_capacity(links.len());
        for link in links {
            let model = by_id
                .remove(&link.module_id)
                .ok_or_else(|| StoreError::Database {
                    message: format!(
                        "selection {} references missing module {}",
                        row.id, link.module_id
                    ),
                })?;
            let source_type: SourceType =
                link.source_type
                    .parse()
                    .map_err(|_| StoreError::Database {
                        message: format!("unknown source_type '{}'", link.source_type),
                    })?;
            entries.push(SelectionEntry {
                item: Self::model_to_item(model)?,
                position: link.position as u32,
                source_type,
            });
        }

        Ok(Selection {
            date: row.date,
            entries,
            created_at: row.created_at,
        })
    }

    /// Insert the module row if it is not already known. Items are
    /// immutable once fetched, so an existing row is left untouched.
    async fn ensure_module(
        txn: &DatabaseTransaction,
        item: &CatalogItem,
    ) -> StoreResult<()> {
        let existing = Modules::find_by_id(item.id as i64).one(txn).await?;
        if existing.is_some() {
            return Ok(());
        }

        let active = modules::ActiveModel {
            id: Set(item.id as i64),
            filename: Set(item.filename.clone()),
            title: Set(item.title.clone()),
            artist: Set(item.artist.clone()),
            format: Set(item.format.clone()),
            size: Set(item.size),
            download_url: Set(item.download_url.clone()),
            modarchive_url: Set(item.modarchive_url.clone()),
            date_added: Set(item.date_added),
            fetched_at: Set(item.fetched_at),
        };
        active.insert(txn).await?;
        Ok(())
    }
}

#[async_trait]
impl SelectionHistoryStore for SelectionSeaOrmRepository {
    async fn get(&self, date: NaiveDate) -> StoreResult<Option<Selection>> {
        let row = DailySelections::find()
            .filter(daily_selections::Column::Date.eq(date))
            .one(&*self.connection)
            .await?;
        match row {
            Some(row) => Ok(Some(self.load_selection(row).await?)),
            None => Ok(None),
        }
    }

    async fn put(&self, selection: &Selection) -> StoreResult<()> {
        let txn = self.connection.begin().await?;

        for entry in &selection.entries {
            Self::ensure_module(&txn, &entry.item).await?;
        }

        let selection_row = daily_selections::ActiveModel {
            date: Set(selection.date),
            created_at: Set(selection.created_at),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for entry in &selection.entries {
            selection_modules::ActiveModel {
                selection_id: Set(selection_row.id),
                module_id: Set(entry.item.id as i64),
                position: Set(entry.position as i32),
                source_type: Set(entry.source_type.to_string()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        debug!(
            "Committed selection for {} with {} entries",
            selection.date,
            selection.entries.len()
        );
        Ok(())
    }

    async fn used_module_ids(
        &self,
        date: NaiveDate,
        window_days: u32,
    ) -> StoreResult<HashSet<u32>> {
        let cutoff = date
            .checked_sub_days(Days::new(window_days as u64))
            .unwrap_or(NaiveDate::MIN);

        let selection_ids: Vec<i32> = DailySelections::find()
            .filter(daily_selections::Column::Date.gte(cutoff))
            .all(&*self.connection)
            .await?
            .into_iter()
            .map(|row| row.id)
            .collect();

        if selection_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let links = SelectionModules::find()
            .filter(selection_modules::Column::SelectionId.is_in(selection_ids))
            .all(&*self.connection)
            .await?;

        let mut used = HashSet::with_capacity(links.len());
        for link in links {
            used.insert(Self::module_id_from_db(link.module_id)?);
        }
        Ok(used)
    }

    async fn latest_on_or_before(&self, date: NaiveDate) -> StoreResult<Option<Selection>> {
        let row = DailySelections::find()
            .filter(daily_selections::Column::Date.lte(date))
            .order_by_desc(daily_selections::Column::Date)
            .one(&*self.connection)
            .await?;
        match row {
            Some(row) => Ok(Some(self.load_selection(row).await?)),
            None => Ok(None),
        }
    }

    async fn recent(&self, limit: u64, offset: u64) -> StoreResult<Vec<Selection>> {
        let rows = DailySelections::find()
            .order_by_desc(daily_selections::Column::Date)
            .limit(limit)
            .offset(offset)
            .all(&*self.connection)
            .await?;

        let mut selections = Vec::with_capacity(rows.len());
        for row in rows {
            selections.push(self.load_selection(row).await?);
        }
        Ok(selections)
    }
}
