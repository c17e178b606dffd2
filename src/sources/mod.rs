//! Catalog source handling
//!
//! The `CatalogSource` trait is the seam between the curation core and the
//! external catalog; `ModArchiveClient` is the production implementation
//! and tests substitute their own.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::SourceResult;
use crate::models::CatalogItem;

pub mod modarchive;
pub mod parser;

pub use modarchive::ModArchiveClient;
pub use parser::{Listing, RawModuleEntry, parse_listing};

/// External catalog abstraction
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch recent uploads, newest first.
    async fn fetch_recent(&self, limit: usize) -> SourceResult<Vec<CatalogItem>>;

    /// Fetch modules whose source-side rating is at least `min_rating`.
    async fn fetch_top_rated(&self, min_rating: u32, limit: usize)
    -> SourceResult<Vec<CatalogItem>>;

    /// Fetch up to `count` source-side randomized modules.
    async fn fetch_random(&self, count: usize) -> SourceResult<Vec<CatalogItem>>;

    /// Resolve the download locator for a module id.
    fn download_url(&self, module_id: u32) -> String;

    /// Fetch raw content bytes from a download locator.
    async fn fetch_bytes(&self, url: &str) -> SourceResult<Bytes>;
}
