//! Application configuration
//!
//! Loaded from a TOML file with per-field serde defaults, so a partial file
//! only has to name what it overrides. A default file is written on first
//! run when none exists.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub curator: CuratorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Hard cap on any single outbound request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Minimum delay between outbound requests (politeness)
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Retry budget for transient failures, exponential backoff between attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Consecutive zero-row fetches before the source counts as structurally broken
    #[serde(default = "default_empty_fetch_threshold")]
    pub empty_fetch_threshold: u32,
    /// Top-rated listings are sampled from a random page within this span
    #[serde(default = "default_rated_page_span")]
    pub rated_page_span: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorConfig {
    #[serde(default = "default_min_count")]
    pub min_count: usize,
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    #[serde(default = "default_preferred_formats")]
    pub preferred_formats: Vec<String>,
    /// Minimum source-side rating (0-10 scale) for the rated pool
    #[serde(default = "default_min_rating")]
    pub min_rating: u32,
    /// Item ids may not repeat across selections within this many days
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: u32,
    /// Commit a below-minimum selection instead of failing when candidate
    /// pools run dry (availability over strict count)
    #[serde(default = "default_commit_short_selections")]
    pub commit_short_selections: bool,
    #[serde(default = "default_recent_fetch_limit")]
    pub recent_fetch_limit: usize,
    #[serde(default = "default_rated_fetch_limit")]
    pub rated_fetch_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    #[serde(default = "default_cache_max_age_days")]
    pub max_age_days: u32,
}

fn default_database_url() -> String {
    "sqlite://./data/mod-curator.db".to_string()
}

fn default_base_url() -> String {
    "https://modarchive.org".to_string()
}

fn default_api_url() -> String {
    "https://api.modarchive.org".to_string()
}

fn default_user_agent() -> String {
    "mod-curator/0.1 (personal tracker music player)".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_empty_fetch_threshold() -> u32 {
    3
}

fn default_rated_page_span() -> u32 {
    50
}

fn default_min_count() -> usize {
    3
}

fn default_max_count() -> usize {
    5
}

fn default_preferred_formats() -> Vec<String> {
    ["mod", "xm", "s3m", "it"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_rating() -> u32 {
    9
}

fn default_recent_window_days() -> u32 {
    30
}

fn default_commit_short_selections() -> bool {
    true
}

fn default_recent_fetch_limit() -> usize {
    30
}

fn default_rated_fetch_limit() -> usize {
    50
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./cache/modules")
}

fn default_cache_max_age_days() -> u32 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: None,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_url: default_api_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            max_retries: default_max_retries(),
            empty_fetch_threshold: default_empty_fetch_threshold(),
            rated_page_span: default_rated_page_span(),
        }
    }
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            min_count: default_min_count(),
            max_count: default_max_count(),
            preferred_formats: default_preferred_formats(),
            min_rating: default_min_rating(),
            recent_window_days: default_recent_window_days(),
            commit_short_selections: default_commit_short_selections(),
            recent_fetch_limit: default_recent_fetch_limit(),
            rated_fetch_limit: default_rated_fetch_limit(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            max_age_days: default_cache_max_age_days(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.curator.min_count <= config.curator.max_count);
        assert_eq!(config.curator.preferred_formats.len(), 4);
        assert!(config.source.request_delay_ms > 0);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [curator]
            min_count = 2
            commit_short_selections = false
            "#,
        )
        .unwrap();
        assert_eq!(config.curator.min_count, 2);
        assert!(!config.curator.commit_short_selections);
        // Untouched sections keep their defaults
        assert_eq!(config.curator.max_count, 5);
        assert_eq!(config.source.max_retries, 3);
        assert_eq!(config.cache.max_age_days, 30);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.curator.min_rating, config.curator.min_rating);
        assert_eq!(parsed.source.base_url, config.source.base_url);
    }
}
