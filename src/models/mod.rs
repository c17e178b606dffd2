//! Domain model definitions
//!
//! Core data structures shared across the catalog client, curator and cache.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One external media entry from The Mod Archive with its metadata.
///
/// Items are immutable once fetched; fields are not re-synced against the
/// source on later sightings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable Mod Archive module id
    pub id: u32,
    pub filename: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Format tag derived from the filename extension (mod, xm, s3m, ...)
    pub format: Option<String>,
    /// Byte size when the source reports one
    pub size: Option<i64>,
    /// Direct download locator
    pub download_url: String,
    /// Source page locator
    pub modarchive_url: String,
    /// Date the module was added to the catalog, when known
    pub date_added: Option<NaiveDate>,
    pub fetched_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Case-insensitive check of the format tag against a preferred list.
    pub fn matches_format(&self, preferred: &[String]) -> bool {
        match &self.format {
            Some(format) => preferred.iter().any(|p| p.eq_ignore_ascii_case(format)),
            None => false,
        }
    }
}

/// Which candidate pool produced a picked item
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceType {
    Recent,
    Rated,
    Random,
}

/// One positioned item inside a daily selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub item: CatalogItem,
    /// 1-based presentation order
    pub position: u32,
    pub source_type: SourceType,
}

/// The committed set of catalog items assigned to one calendar date.
///
/// A selection is created once per date and read-only after commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub date: NaiveDate,
    /// Entries in presentation order
    pub entries: Vec<SelectionEntry>,
    pub created_at: DateTime<Utc>,
}

impl Selection {
    /// Item ids in presentation order.
    pub fn module_ids(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.item.id).collect()
    }
}

/// A user rating for one module (owned by the rating store; the curation
/// core only ever reads these)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub module_id: u32,
    /// 1-5 stars
    pub score: u8,
    pub comment: Option<String>,
    pub rated_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sidecar metadata persisted next to each cached content file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryMetadata {
    pub module_id: u32,
    pub byte_size: u64,
    pub fetched_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// Result of an age-based eviction sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionReport {
    pub removed_count: usize,
    pub bytes_freed: u64,
}

/// Point-in-time cache usage numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_match_is_case_insensitive() {
        let item = CatalogItem {
            id: 1,
            filename: "song.XM".to_string(),
            title: None,
            artist: None,
            format: Some("XM".to_string()),
            size: None,
            download_url: String::new(),
            modarchive_url: String::new(),
            date_added: None,
            fetched_at: Utc::now(),
        };
        assert!(item.matches_format(&["mod".to_string(), "xm".to_string()]));
        assert!(!item.matches_format(&["s3m".to_string()]));
    }

    #[test]
    fn source_type_round_trips_as_lowercase() {
        assert_eq!(SourceType::Recent.to_string(), "recent");
        assert_eq!("rated".parse::<SourceType>().unwrap(), SourceType::Rated);
    }
}
