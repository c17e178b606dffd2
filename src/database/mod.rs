//! SeaORM-based database access
//!
//! SQLite-first connection management with auto-creation of the database
//! file, plus schema migrations run at startup.

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database as SeaOrmDatabase, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use migrations::Migrator;

pub mod migrations;
pub mod repositories;

/// Database connection manager
#[derive(Clone)]
pub struct Database {
    pub connection: Arc<DatabaseConnection>,
}

impl Database {
    /// Connect and bring the schema up to date.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = Self::ensure_sqlite_auto_creation(&config.url)?;
        info!("Connecting to database");

        let mut options = ConnectOptions::new(&url);
        options
            .max_connections(config.max_connections.unwrap_or(5))
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(600));

        let connection = SeaOrmDatabase::connect(options)
            .await
            .with_context(|| format!("failed to connect to database at '{}'", config.url))?;

        Migrator::up(&connection, None)
            .await
            .context("failed to run database migrations")?;
        debug!("Database connection established, schema up to date");

        Ok(Self {
            connection: Arc::new(connection),
        })
    }

    /// For SQLite URLs, create the parent directory and enable
    /// create-if-missing mode so first runs need no manual setup.
    fn ensure_sqlite_auto_creation(url: &str) -> Result<String> {
        if !url.starts_with("sqlite:") {
            return Ok(url.to_string());
        }

        let path = url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let path = path.split('?').next().unwrap_or(path);
        // In-memory databases need neither a directory nor create mode.
        if path == ":memory:" {
            return Ok(url.to_string());
        }
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        if url.contains("mode=") {
            Ok(url.to_string())
        } else if url.contains('?') {
            Ok(format!("{url}&mode=rwc"))
        } else {
            Ok(format!("{url}?mode=rwc"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_urls_gain_rwc_mode() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/data/app.db", dir.path().display());
        let fixed = Database::ensure_sqlite_auto_creation(&url).unwrap();
        assert_eq!(fixed, format!("{url}?mode=rwc"));
        assert!(dir.path().join("data").is_dir());
    }

    #[test]
    fn memory_urls_pass_through_unchanged() {
        let url = Database::ensure_sqlite_auto_creation("sqlite://:memory:").unwrap();
        assert_eq!(url, "sqlite://:memory:");
    }

    #[test]
    fn existing_mode_parameter_is_preserved() {
        let url = Database::ensure_sqlite_auto_creation("sqlite://db.sqlite?mode=ro").unwrap();
        assert_eq!(url, "sqlite://db.sqlite?mode=ro");
    }

    #[test]
    fn non_sqlite_urls_pass_through() {
        let url = Database::ensure_sqlite_auto_creation("postgres://host/db").unwrap();
        assert_eq!(url, "postgres://host/db");
    }
}
