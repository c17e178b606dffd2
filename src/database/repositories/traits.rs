//! Store abstractions consumed by the curation core
//!
//! The curator only ever talks to these traits; the SeaORM repositories are
//! the production implementations and tests provide in-memory ones.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;

use crate::errors::StoreResult;
use crate::models::{Rating, Selection};

/// Persistence for committed daily selections and dedup lookups
#[async_trait]
pub trait SelectionHistoryStore: Send + Sync {
    /// Committed selection for `date`, if any.
    async fn get(&self, date: NaiveDate) -> StoreResult<Option<Selection>>;

    /// Persist a freshly generated selection. The date must not already
    /// hold a committed selection.
    async fn put(&self, selection: &Selection) -> StoreResult<()>;

    /// Every module id used by any selection dated within `window_days`
    /// before `date` (inclusive of `date` itself).
    async fn used_module_ids(&self, date: NaiveDate, window_days: u32)
    -> StoreResult<HashSet<u32>>;

    /// Most recent committed selection dated on or before `date`.
    async fn latest_on_or_before(&self, date: NaiveDate) -> StoreResult<Option<Selection>>;

    /// Committed selections, newest first.
    async fn recent(&self, limit: u64, offset: u64) -> StoreResult<Vec<Selection>>;
}

/// User ratings, read-only from the curation core's perspective
#[async_trait]
pub trait RatingStore: Send + Sync {
    async fn get(&self, module_id: u32) -> StoreResult<Option<Rating>>;

    /// Create or replace the single rating for a module.
    async fn upsert(&self, module_id: u32, score: u8, comment: Option<String>)
    -> StoreResult<Rating>;
}
