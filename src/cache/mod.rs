//! Local content cache for module files
//!
//! Maps module ids to bytes on disk. Misses download through the catalog
//! client and commit write-to-temporary then atomic rename, so a partial
//! write is never visible. Concurrent `get` calls for one id collapse into
//! a single shared in-flight download whose result (success or error) every
//! waiter receives. Entries age out by last access via `evict_older_than`.
//!
//! Each entry is a `{id}.dat` content file plus a `{id}.json` sidecar
//! carrying fetch and last-access timestamps; a missing sidecar falls back
//! to the file's mtime.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::errors::{AppError, AppResult, CacheError};
use crate::models::{CacheEntryMetadata, CacheStats, EvictionReport};
use crate::sources::CatalogSource;

type FlightResult = Result<Bytes, CacheError>;
type Flight = Shared<BoxFuture<'static, FlightResult>>;

/// Download-on-miss content cache with per-id single-flight
#[derive(Clone)]
pub struct ContentCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    root: PathBuf,
    catalog: Arc<dyn CatalogSource>,
    /// Ids with an in-flight `get`; eviction never touches these
    flights: Mutex<HashMap<u32, Flight>>,
}

impl ContentCache {
    pub fn new(catalog: Arc<dyn CatalogSource>, config: &CacheConfig) -> AppResult<Self> {
        std::fs::create_dir_all(&config.path).map_err(|e| {
            AppError::configuration(format!(
                "failed to create cache directory {}: {e}",
                config.path.display()
            ))
        })?;
        Ok(Self {
            inner: Arc::new(CacheInner {
                root: config.path.clone(),
                catalog,
                flights: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Return the content bytes for a module, downloading and committing a
    /// cache entry on miss.
    pub async fn get(&self, module_id: u32) -> Result<Bytes, CacheError> {
        let flight = {
            let mut flights = self.inner.flights.lock().expect("flight map poisoned");
            match flights.get(&module_id) {
                Some(existing) => existing.clone(),
                None => {
                    let inner = Arc::clone(&self.inner);
                    let flight: Flight = async move {
                        let result = inner.load_or_fetch(module_id).await;
                        inner
                            .flights
                            .lock()
                            .expect("flight map poisoned")
                            .remove(&module_id);
                        result
                    }
                    .boxed()
                    .shared();
                    flights.insert(module_id, flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    /// Remove entries whose last access is older than `days`. Entries with
    /// an in-flight `get` are skipped.
    pub async fn evict_older_than(&self, days: u32) -> Result<EvictionReport, CacheError> {
        let cutoff = Utc::now() - Duration::days(days as i64);
        let mut removed_count = 0;
        let mut bytes_freed = 0u64;

        let mut dir = tokio::fs::read_dir(&self.inner.root)
            .await
            .map_err(|e| CacheError::Read {
                message: format!("failed to list cache directory: {e}"),
            })?;

        while let Some(entry) = dir.next_entry().await.map_err(|e| CacheError::Read {
            message: format!("failed to read cache directory entry: {e}"),
        })? {
            let path = entry.path();
            let Some(module_id) = Self::entry_id(&path) else {
                continue;
            };
            if self
                .inner
                .flights
                .lock()
                .expect("flight map poisoned")
                .contains_key(&module_id)
            {
                debug!("Skipping eviction of in-flight module {}", module_id);
                continue;
            }

            let last_accessed = self.inner.last_accessed(module_id, &path).await;
            if last_accessed >= cutoff {
                continue;
            }

            let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    let _ = tokio::fs::remove_file(self.inner.sidecar_path(module_id)).await;
                    removed_count += 1;
                    bytes_freed += size;
                    debug!("Evicted module {} ({} bytes)", module_id, size);
                }
                Err(e) => warn!("Failed to evict cache file {}: {}", path.display(), e),
            }
        }

        info!(
            "Eviction sweep removed {} entries ({} bytes freed)",
            removed_count, bytes_freed
        );
        Ok(EvictionReport {
            removed_count,
            bytes_freed,
        })
    }

    /// Current entry count and total content bytes.
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut entry_count = 0;
        let mut total_bytes = 0u64;

        let mut dir = tokio::fs::read_dir(&self.inner.root)
            .await
            .map_err(|e| CacheError::Read {
                message: format!("failed to list cache directory: {e}"),
            })?;
        while let Some(entry) = dir.next_entry().await.map_err(|e| CacheError::Read {
            message: format!("failed to read cache directory entry: {e}"),
        })? {
            if Self::entry_id(&entry.path()).is_some() {
                entry_count += 1;
                total_bytes += tokio::fs::metadata(entry.path())
                    .await
                    .map(|m| m.len())
                    .unwrap_or(0);
            }
        }

        Ok(CacheStats {
            entry_count,
            total_bytes,
        })
    }

    /// Module id of a content file path, `None` for sidecars and strays.
    fn entry_id(path: &Path) -> Option<u32> {
        if path.extension().is_none_or(|ext| ext != "dat") {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }
}

impl CacheInner {
    fn entry_path(&self, module_id: u32) -> PathBuf {
        self.root.join(format!("{module_id}.dat"))
    }

    fn sidecar_path(&self, module_id: u32) -> PathBuf {
        self.root.join(format!("{module_id}.json"))
    }

    async fn load_or_fetch(&self, module_id: u32) -> FlightResult {
        let path = self.entry_path(module_id);

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Loading module {} from cache", module_id);
                self.touch(module_id, bytes.len() as u64).await;
                return Ok(Bytes::from(bytes));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CacheError::Read {
                    message: format!("failed to read cached module {module_id}: {e}"),
                });
            }
        }

        let url = self.catalog.download_url(module_id);
        info!("Downloading module {} from {}", module_id, url);
        let bytes = self
            .catalog
            .fetch_bytes(&url)
            .await
            .map_err(|e| CacheError::Download {
                module_id,
                message: e.to_string(),
            })?;

        self.commit_entry(module_id, &bytes)?;
        info!("Cached module {} ({} bytes)", module_id, bytes.len());
        Ok(bytes)
    }

    /// Write the content to a temporary file in the cache directory, then
    /// atomically move it into place.
    fn commit_entry(&self, module_id: u32, bytes: &Bytes) -> Result<(), CacheError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root).map_err(|e| {
            CacheError::Write {
                message: format!("failed to create temporary file: {e}"),
            }
        })?;
        tmp.write_all(bytes).map_err(|e| CacheError::Write {
            message: format!("failed to write module {module_id}: {e}"),
        })?;
        tmp.persist(self.entry_path(module_id))
            .map_err(|e| CacheError::Write {
                message: format!("failed to commit module {module_id}: {e}"),
            })?;

        let now = Utc::now();
        self.write_sidecar(&CacheEntryMetadata {
            module_id,
            byte_size: bytes.len() as u64,
            fetched_at: now,
            last_accessed: now,
        });
        Ok(())
    }

    /// Update the last-access timestamp after a hit. Best effort: the
    /// content is already served, a stale sidecar only skews eviction.
    async fn touch(&self, module_id: u32, byte_size: u64) {
        let mut metadata = match self.read_sidecar(module_id).await {
            Some(metadata) => metadata,
            None => CacheEntryMetadata {
                module_id,
                byte_size,
                fetched_at: self
                    .file_mtime(&self.entry_path(module_id))
                    .await
                    .unwrap_or_else(Utc::now),
                last_accessed: Utc::now(),
            },
        };
        metadata.last_accessed = Utc::now();
        self.write_sidecar(&metadata);
    }

    async fn read_sidecar(&self, module_id: u32) -> Option<CacheEntryMetadata> {
        let raw = tokio::fs::read(self.sidecar_path(module_id)).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }

    fn write_sidecar(&self, metadata: &CacheEntryMetadata) {
        match serde_json::to_vec(metadata) {
            Ok(raw) => {
                if let Err(e) = std::fs::write(self.sidecar_path(metadata.module_id), raw) {
                    warn!(
                        "Failed to write cache metadata for module {}: {}",
                        metadata.module_id, e
                    );
                }
            }
            Err(e) => warn!(
                "Failed to serialize cache metadata for module {}: {}",
                metadata.module_id, e
            ),
        }
    }

    /// Last access time for an entry: sidecar timestamp, else file mtime,
    /// else "now" (never evict what we cannot date).
    async fn last_accessed(&self, module_id: u32, path: &Path) -> DateTime<Utc> {
        if let Some(metadata) = self.read_sidecar(module_id).await {
            return metadata.last_accessed;
        }
        self.file_mtime(path).await.unwrap_or_else(Utc::now)
    }

    async fn file_mtime(&self, path: &Path) -> Option<DateTime<Utc>> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        metadata.modified().ok().map(DateTime::<Utc>::from)
    }
}
