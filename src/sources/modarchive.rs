//! Mod Archive catalog client
//!
//! Talks to the scrape-style listing pages on modarchive.org and the
//! download endpoint on api.modarchive.org. Outbound traffic is throttled
//! to a minimum inter-request delay, every request carries a hard timeout,
//! and transient failures are retried with exponential backoff up to a
//! bounded attempt count. A run of fetches that parse to zero rows marks
//! the source as structurally unavailable rather than transient.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::errors::{AppError, AppResult, SourceError, SourceResult};
use crate::models::CatalogItem;
use crate::sources::CatalogSource;
use crate::sources::parser::{RawModuleEntry, parse_listing};

/// Retry behavior for transient fetch failures
#[derive(Debug, Clone)]
struct RetryConfig {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis(delay as u64).min(self.max_delay)
    }
}

/// Outcome of a single HTTP attempt, before retry policy is applied
struct FetchFailure {
    transient: bool,
    message: String,
}

pub struct ModArchiveClient {
    http: reqwest::Client,
    base_url: String,
    api_url: String,
    request_delay: Duration,
    retry: RetryConfig,
    empty_fetch_threshold: u32,
    rated_page_span: u32,
    /// Politeness gate: timestamp of the last outbound request. The lock is
    /// held across the pacing sleep so requests leave one at a time.
    last_request: Mutex<Option<Instant>>,
    consecutive_empty: AtomicU32,
}

impl ModArchiveClient {
    pub fn new(config: &SourceConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(AppError::Http)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            request_delay: Duration::from_millis(config.request_delay_ms),
            retry: RetryConfig {
                max_attempts: config.max_retries.max(1),
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(10),
                backoff_multiplier: 2.0,
            },
            empty_fetch_threshold: config.empty_fetch_threshold.max(1),
            rated_page_span: config.rated_page_span.max(1),
            last_request: Mutex::new(None),
            consecutive_empty: AtomicU32::new(0),
        })
    }

    /// Wait until the minimum inter-request delay has elapsed.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.request_delay {
                sleep(self.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn try_get_bytes(&self, url: &str) -> Result<Bytes, FetchFailure> {
        let response = self.http.get(url).send().await.map_err(|e| FetchFailure {
            transient: e.is_timeout() || e.is_connect() || e.is_request(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure {
                transient: status.is_server_error(),
                message: format!("HTTP {status}"),
            });
        }

        response.bytes().await.map_err(|e| FetchFailure {
            transient: true,
            message: format!("failed to read response body: {e}"),
        })
    }

    /// GET with politeness pacing and bounded exponential-backoff retries.
    async fn get_with_retry(&self, url: &str) -> SourceResult<Bytes> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.throttle().await;
            match self.try_get_bytes(url).await {
                Ok(bytes) => {
                    debug!("Fetched {} bytes from {}", bytes.len(), url);
                    return Ok(bytes);
                }
                Err(failure) if failure.transient && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Transient fetch failure for {} (attempt {}/{}): {}; retrying in {:?}",
                        url, attempt, self.retry.max_attempts, failure.message, delay
                    );
                    sleep(delay).await;
                }
                Err(failure) => {
                    return Err(SourceError::Retryable {
                        url: url.to_string(),
                        message: failure.message,
                    });
                }
            }
        }
    }

    /// Fetch a listing page and parse it, tracking the consecutive-empty run.
    async fn fetch_entries(&self, url: &str) -> SourceResult<Vec<RawModuleEntry>> {
        let body = self.get_with_retry(url).await?;
        let html = String::from_utf8_lossy(&body);
        let listing = parse_listing(&html);

        if listing.skipped > 0 {
            warn!(
                "Skipped {} malformed rows while parsing {}",
                listing.skipped, url
            );
        }

        if listing.entries.is_empty() {
            let streak = self.consecutive_empty.fetch_add(1, Ordering::SeqCst) + 1;
            if streak >= self.empty_fetch_threshold {
                return Err(SourceError::Unavailable {
                    consecutive_empty: streak,
                });
            }
            warn!(
                "No parseable rows in {} ({} consecutive empty fetches)",
                url, streak
            );
        } else {
            self.consecutive_empty.store(0, Ordering::SeqCst);
        }

        Ok(listing.entries)
    }

    fn to_item(&self, raw: RawModuleEntry) -> CatalogItem {
        CatalogItem {
            download_url: self.download_url(raw.id),
            modarchive_url: format!(
                "{}/index.php?request=view_by_moduleid&query={}",
                self.base_url, raw.id
            ),
            id: raw.id,
            filename: raw.filename,
            title: raw.title,
            artist: raw.artist,
            format: raw.format,
            size: None,
            date_added: None,
            fetched_at: Utc::now(),
        }
    }
}

#[async_trait]
impl CatalogSource for ModArchiveClient {
    async fn fetch_recent(&self, limit: usize) -> SourceResult<Vec<CatalogItem>> {
        let url = format!("{}/index.php?request=view_actions_uploads", self.base_url);
        info!("Fetching recent uploads from {}", url);
        let entries = self.fetch_entries(&url).await?;
        let items: Vec<CatalogItem> = entries
            .into_iter()
            .take(limit)
            .map(|raw| self.to_item(raw))
            .collect();
        info!("Found {} recent uploads", items.len());
        Ok(items)
    }

    async fn fetch_top_rated(
        &self,
        min_rating: u32,
        limit: usize,
    ) -> SourceResult<Vec<CatalogItem>> {
        // Sample a random results page so repeated runs see different slices
        // of the rated catalog.
        let page = rand::rng().random_range(1..=self.rated_page_span);
        let url = format!(
            "{}/index.php?request=view_by_rating_comments&query={}&page={}",
            self.base_url, min_rating, page
        );
        info!(
            "Fetching top-rated modules (>={}) from page {}",
            min_rating, page
        );
        let entries = self.fetch_entries(&url).await?;
        let items: Vec<CatalogItem> = entries
            .into_iter()
            .take(limit)
            .map(|raw| self.to_item(raw))
            .collect();
        info!("Found {} top-rated modules on page {}", items.len(), page);
        Ok(items)
    }

    async fn fetch_random(&self, count: usize) -> SourceResult<Vec<CatalogItem>> {
        let url = format!("{}/index.php?request=view_random", self.base_url);
        let mut items: Vec<CatalogItem> = Vec::with_capacity(count);

        // The random endpoint serves one module per request.
        for draw in 0..count {
            match self.fetch_entries(&url).await {
                Ok(entries) => {
                    if let Some(raw) = entries
                        .into_iter()
                        .find(|e| !items.iter().any(|i| i.id == e.id))
                    {
                        items.push(self.to_item(raw));
                    }
                }
                Err(e @ SourceError::Unavailable { .. }) => return Err(e),
                Err(e) => {
                    if items.is_empty() {
                        return Err(e);
                    }
                    // Keep what we already drew rather than discarding it.
                    warn!(
                        "Random draw {}/{} failed ({}); returning {} modules",
                        draw + 1,
                        count,
                        e,
                        items.len()
                    );
                    break;
                }
            }
        }

        info!("Found {} random modules", items.len());
        Ok(items)
    }

    fn download_url(&self, module_id: u32) -> String {
        format!("{}/downloads.php?moduleid={}", self.api_url, module_id)
    }

    async fn fetch_bytes(&self, url: &str) -> SourceResult<Bytes> {
        info!("Downloading content from {}", url);
        self.get_with_retry(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;

    fn client() -> ModArchiveClient {
        ModArchiveClient::new(&SourceConfig::default()).unwrap()
    }

    #[test]
    fn download_url_targets_the_api_host() {
        let client = client();
        assert_eq!(
            client.download_url(212618),
            "https://api.modarchive.org/downloads.php?moduleid=212618"
        );
    }

    #[test]
    fn backoff_delays_grow_and_cap() {
        let retry = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(500));
        assert_eq!(retry.delay_for(2), Duration::from_millis(1000));
        assert_eq!(retry.delay_for(3), Duration::from_millis(2000));
        assert_eq!(retry.delay_for(20), Duration::from_secs(10));
    }

    #[test]
    fn raw_entries_become_items_with_locators() {
        let client = client();
        let item = client.to_item(RawModuleEntry {
            id: 7,
            filename: "seven.xm".to_string(),
            title: Some("Seven".to_string()),
            artist: None,
            format: Some("xm".to_string()),
        });
        assert_eq!(
            item.download_url,
            "https://api.modarchive.org/downloads.php?moduleid=7"
        );
        assert!(item.modarchive_url.contains("view_by_moduleid&query=7"));
    }
}
