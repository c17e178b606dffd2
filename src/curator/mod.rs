//! Daily selection curator
//!
//! Generates at most one committed selection per calendar date. A keyed
//! mutex map gives each date an exclusive generation right: concurrent
//! callers for the same date wait for the winner's result instead of
//! running their own pass, and a committed date is served straight from
//! the history store with no side effects.

use chrono::{NaiveDate, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::CuratorConfig;
use crate::database::repositories::SelectionHistoryStore;
use crate::errors::{CuratorError, SourceError, SourceResult};
use crate::models::{CatalogItem, Selection, SelectionEntry, SourceType};
use crate::sources::CatalogSource;

/// Extra random draws requested beyond the open slots, since format
/// filtering and dedup discard part of the pool.
const RANDOM_POOL_HEADROOM: usize = 5;

pub struct Curator {
    catalog: Arc<dyn CatalogSource>,
    history: Arc<dyn SelectionHistoryStore>,
    config: CuratorConfig,
    /// Shared randomness source; seedable in tests for reproducible picks
    rng: Mutex<StdRng>,
    /// Per-date generation locks, scoped strictly to one date each
    generation_locks: Mutex<HashMap<NaiveDate, Arc<Mutex<()>>>>,
}

impl Curator {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        history: Arc<dyn SelectionHistoryStore>,
        config: CuratorConfig,
    ) -> Self {
        Self::with_rng(catalog, history, config, StdRng::from_os_rng())
    }

    /// Construct with an explicit randomness source. Tests seed this to
    /// make pick outcomes reproducible.
    pub fn with_rng(
        catalog: Arc<dyn CatalogSource>,
        history: Arc<dyn SelectionHistoryStore>,
        config: CuratorConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            catalog,
            history,
            config,
            rng: Mutex::new(rng),
            generation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return the committed selection for `date`, generating and
    /// committing one first if none exists yet.
    ///
    /// Re-invoking for an already committed date performs no fetches and
    /// returns the stored result unchanged.
    pub async fn generate_or_get_daily(&self, date: NaiveDate) -> Result<Selection, CuratorError> {
        if let Some(existing) = self.history.get(date).await? {
            info!("Found existing selection for {}", date);
            return Ok(existing);
        }

        let date_lock = {
            let mut locks = self.generation_locks.lock().await;
            locks
                .entry(date)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = date_lock.lock().await;

        // Another caller may have generated while we waited for the lock.
        let result = match self.history.get(date).await? {
            Some(existing) => Ok(existing),
            None => match self.run_generation_pass(date).await {
                Ok(selection) => self.commit(selection).await,
                Err(e) => Err(e),
            },
        };

        self.generation_locks.lock().await.remove(&date);
        result
    }

    /// Persist a freshly generated selection. When the unique date key
    /// rejects the write because another caller committed first (possible
    /// after a failed pass released the date lock), the stored selection
    /// wins and is returned instead of the write error.
    async fn commit(&self, selection: Selection) -> Result<Selection, CuratorError> {
        match self.history.put(&selection).await {
            Ok(()) => {
                info!(
                    "Committed selection for {} with {} modules",
                    selection.date,
                    selection.entries.len()
                );
                Ok(selection)
            }
            Err(e) => match self.history.get(selection.date).await? {
                Some(existing) => {
                    info!(
                        "Selection for {} was committed concurrently; using it",
                        selection.date
                    );
                    Ok(existing)
                }
                None => Err(e.into()),
            },
        }
    }

    /// Most recent committed selection on or before `date`; the caller's
    /// fallback when the source is unavailable for a fresh generation.
    pub async fn fallback_selection(
        &self,
        date: NaiveDate,
    ) -> Result<Option<Selection>, CuratorError> {
        Ok(self.history.latest_on_or_before(date).await?)
    }

    /// Committed selections, newest first.
    pub async fn history(&self, limit: u64, offset: u64) -> Result<Vec<Selection>, CuratorError> {
        Ok(self.history.recent(limit, offset).await?)
    }

    async fn run_generation_pass(&self, date: NaiveDate) -> Result<Selection, CuratorError> {
        info!("Generating new selection for {}", date);

        let dedup = self
            .history
            .used_module_ids(date, self.config.recent_window_days)
            .await?;

        let mut picked: Vec<(CatalogItem, SourceType)> = Vec::new();
        let mut picked_ids: HashSet<u32> = HashSet::new();
        let mut source_failure: Option<SourceError> = None;

        // One pick from the recent pool. An empty pool skips the pick
        // with no substitution.
        let recent_pool = self.pool(
            self.catalog.fetch_recent(self.config.recent_fetch_limit).await,
            "recent",
            &mut source_failure,
        )?;
        let recent_pool = self.admissible(recent_pool, &dedup, &picked_ids, true);
        if let Some(item) = self.choose_one(&recent_pool).await {
            info!("Selected recent module: {}", item.filename);
            picked_ids.insert(item.id);
            picked.push((item, SourceType::Recent));
        } else {
            warn!("No recent modules available with preferred formats");
        }

        // One pick from the rated pool, same empty-pool rule.
        let rated_pool = self.pool(
            self.catalog
                .fetch_top_rated(self.config.min_rating, self.config.rated_fetch_limit)
                .await,
            "rated",
            &mut source_failure,
        )?;
        let rated_pool = self.admissible(rated_pool, &dedup, &picked_ids, true);
        if let Some(item) = self.choose_one(&rated_pool).await {
            info!("Selected highly-rated module: {}", item.filename);
            picked_ids.insert(item.id);
            picked.push((item, SourceType::Rated));
        } else {
            warn!("No highly-rated modules available with preferred formats");
        }

        // Fill the remaining slots from the random pool, without
        // replacement.
        let target = {
            let mut rng = self.rng.lock().await;
            rng.random_range(self.config.min_count..=self.config.max_count)
        };
        let goal = target.clamp(self.config.min_count, self.config.max_count);
        let remaining = goal.saturating_sub(picked.len());

        if remaining > 0 {
            let random_pool = self.pool(
                self.catalog
                    .fetch_random(remaining + RANDOM_POOL_HEADROOM)
                    .await,
                "random",
                &mut source_failure,
            )?;
            let random_pool = self.admissible(random_pool, &dedup, &picked_ids, true);
            self.fill_from(&mut picked, &mut picked_ids, random_pool, remaining)
                .await;
        }

        // Shortfall path: one broadened, format-unfiltered re-fetch before
        // deciding between committing short and failing.
        if picked.len() < self.config.min_count {
            let deficit = self.config.min_count - picked.len();
            warn!(
                "Selection for {} is short by {}; retrying with unfiltered random pool",
                date, deficit
            );
            let broadened = self.pool(
                self.catalog
                    .fetch_random(deficit + RANDOM_POOL_HEADROOM)
                    .await,
                "random (broadened)",
                &mut source_failure,
            )?;
            let broadened = self.admissible(broadened, &dedup, &picked_ids, false);
            let deficit_to_goal = goal.saturating_sub(picked.len());
            self.fill_from(&mut picked, &mut picked_ids, broadened, deficit_to_goal)
                .await;
        }

        if picked.is_empty() {
            // Never commit an empty selection. Prefer reporting the source
            // failure when one prevented us from seeing any candidates.
            return Err(match source_failure {
                Some(e) => CuratorError::Source(e),
                None => CuratorError::InsufficientCandidates {
                    date,
                    picked: 0,
                    min: self.config.min_count,
                },
            });
        }

        if picked.len() < self.config.min_count && !self.config.commit_short_selections {
            return Err(CuratorError::InsufficientCandidates {
                date,
                picked: picked.len(),
                min: self.config.min_count,
            });
        }

        // Randomize presentation order; the pool tags stay with their items.
        {
            let mut rng = self.rng.lock().await;
            picked.shuffle(&mut *rng);
        }

        let entries = picked
            .into_iter()
            .enumerate()
            .map(|(index, (item, source_type))| SelectionEntry {
                item,
                position: index as u32 + 1,
                source_type,
            })
            .collect();

        Ok(Selection {
            date,
            entries,
            created_at: Utc::now(),
        })
    }

    /// Resolve one pool fetch. A structurally broken source aborts the
    /// pass; transient or parse failures degrade to an empty pool so the
    /// other pools can still produce a selection.
    fn pool(
        &self,
        fetched: SourceResult<Vec<CatalogItem>>,
        label: &str,
        failure: &mut Option<SourceError>,
    ) -> Result<Vec<CatalogItem>, CuratorError> {
        match fetched {
            Ok(items) => Ok(items),
            Err(e @ SourceError::Unavailable { .. }) => Err(e.into()),
            Err(e) => {
                warn!("Fetching {} pool failed: {}", label, e);
                *failure = Some(e);
                Ok(Vec::new())
            }
        }
    }

    /// Filter a pool down to admissible candidates: preferred formats
    /// (unless broadened), nothing from the dedup window, nothing already
    /// picked.
    fn admissible(
        &self,
        items: Vec<CatalogItem>,
        dedup: &HashSet<u32>,
        picked_ids: &HashSet<u32>,
        enforce_formats: bool,
    ) -> Vec<CatalogItem> {
        items
            .into_iter()
            .filter(|item| !dedup.contains(&item.id) && !picked_ids.contains(&item.id))
            .filter(|item| {
                !enforce_formats || item.matches_format(&self.config.preferred_formats)
            })
            .collect()
    }

    async fn choose_one(&self, pool: &[CatalogItem]) -> Option<CatalogItem> {
        let mut rng = self.rng.lock().await;
        pool.choose(&mut *rng).cloned()
    }

    /// Draw up to `count` items from `pool` uniformly without replacement.
    async fn fill_from(
        &self,
        picked: &mut Vec<(CatalogItem, SourceType)>,
        picked_ids: &mut HashSet<u32>,
        mut pool: Vec<CatalogItem>,
        count: usize,
    ) {
        {
            let mut rng = self.rng.lock().await;
            pool.shuffle(&mut *rng);
        }
        for item in pool.into_iter().take(count) {
            info!("Selected random module: {}", item.filename);
            picked_ids.insert(item.id);
            picked.push((item, SourceType::Random));
        }
    }
}
