//! Shared test doubles: an in-memory catalog source and selection store.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Days, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use mod_curator::errors::{SourceError, SourceResult, StoreError, StoreResult};
use mod_curator::models::{CatalogItem, Rating, Selection};
use mod_curator::sources::CatalogSource;
use mod_curator::database::repositories::SelectionHistoryStore;

/// Build a catalog item with the given id and format tag.
pub fn item(id: u32, format: &str) -> CatalogItem {
    CatalogItem {
        id,
        filename: format!("track_{id}.{format}"),
        title: Some(format!("Track {id}")),
        artist: Some("tester".to_string()),
        format: Some(format.to_string()),
        size: Some(4096),
        download_url: format!("mock://download/{id}"),
        modarchive_url: format!("mock://module/{id}"),
        date_added: None,
        fetched_at: Utc::now(),
    }
}

/// Scripted catalog source with per-pool call counters.
#[derive(Default)]
pub struct MockCatalog {
    pub recent: Vec<CatalogItem>,
    pub rated: Vec<CatalogItem>,
    pub random: Vec<CatalogItem>,
    pub recent_calls: AtomicUsize,
    pub rated_calls: AtomicUsize,
    pub random_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub fail_downloads: AtomicBool,
    /// Injected latency per fetch, to widen race windows in tests
    pub fetch_delay: Option<Duration>,
    pub download_delay: Option<Duration>,
}

impl MockCatalog {
    pub fn with_pools(
        recent: Vec<CatalogItem>,
        rated: Vec<CatalogItem>,
        random: Vec<CatalogItem>,
    ) -> Self {
        Self {
            recent,
            rated,
            random,
            ..Self::default()
        }
    }

    async fn pause(&self, delay: Option<Duration>) {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl CatalogSource for MockCatalog {
    async fn fetch_recent(&self, limit: usize) -> SourceResult<Vec<CatalogItem>> {
        self.recent_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(self.fetch_delay).await;
        Ok(self.recent.iter().take(limit).cloned().collect())
    }

    async fn fetch_top_rated(
        &self,
        _min_rating: u32,
        limit: usize,
    ) -> SourceResult<Vec<CatalogItem>> {
        self.rated_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(self.fetch_delay).await;
        Ok(self.rated.iter().take(limit).cloned().collect())
    }

    async fn fetch_random(&self, count: usize) -> SourceResult<Vec<CatalogItem>> {
        self.random_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(self.fetch_delay).await;
        Ok(self.random.iter().take(count).cloned().collect())
    }

    fn download_url(&self, module_id: u32) -> String {
        format!("mock://download/{module_id}")
    }

    async fn fetch_bytes(&self, url: &str) -> SourceResult<Bytes> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(self.download_delay).await;
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(SourceError::Retryable {
                url: url.to_string(),
                message: "simulated download failure".to_string(),
            });
        }
        Ok(Bytes::from(format!("content of {url}")))
    }
}

/// In-memory selection store with the same uniqueness rule as the database.
#[derive(Default)]
pub struct MemoryHistory {
    selections: Mutex<HashMap<NaiveDate, Selection>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a committed selection directly, bypassing the curator.
    pub fn seed(&self, selection: Selection) {
        self.selections
            .lock()
            .unwrap()
            .insert(selection.date, selection);
    }
}

#[async_trait]
impl SelectionHistoryStore for MemoryHistory {
    async fn get(&self, date: NaiveDate) -> StoreResult<Option<Selection>> {
        Ok(self.selections.lock().unwrap().get(&date).cloned())
    }

    async fn put(&self, selection: &Selection) -> StoreResult<()> {
        let mut selections = self.selections.lock().unwrap();
        if selections.contains_key(&selection.date) {
            return Err(StoreError::Database {
                message: format!("selection for {} already exists", selection.date),
            });
        }
        selections.insert(selection.date, selection.clone());
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
        let selections = self.selections.lock().unwrap();
        Ok(selections
            .values()
            .filter(|s| s.date >= cutoff)
            .flat_map(|s| s.module_ids())
            .collect())
    }

    async fn latest_on_or_before(&self, date: NaiveDate) -> StoreResult<Option<Selection>> {
        let selections = self.selections.lock().unwrap();
        Ok(selections
            .values()
            .filter(|s| s.date <= date)
            .max_by_key(|s| s.date)
            .cloned())
    }

    async fn recent(&self, limit: u64, offset: u64) -> StoreResult<Vec<Selection>> {
        let selections = self.selections.lock().unwrap();
        let mut all: Vec<Selection> = selections.values().cloned().collect();
        all.sort_by_key(|s| std::cmp::Reverse(s.date));
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

/// A rating value usable in assertions without a database.
pub fn rating(module_id: u32, score: u8) -> Rating {
    let now = Utc::now();
    Rating {
        module_id,
        score,
        comment: None,
        rated_at: now,
        updated_at: now,
    }
}
