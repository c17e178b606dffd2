use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mod_curator::cache::ContentCache;
use mod_curator::config::Config;
use mod_curator::curator::Curator;
use mod_curator::database::Database;
use mod_curator::database::repositories::{
    RatingSeaOrmRepository, RatingStore, SelectionSeaOrmRepository,
};
use mod_curator::errors::CuratorError;
use mod_curator::models::Selection;
use mod_curator::sources::{CatalogSource, ModArchiveClient};

#[derive(Parser)]
#[command(name = "mod-curator", about = "Daily tracker music curation from The Mod Archive")]
struct Cli {
    /// Path to the configuration file (overrides CONFIG_FILE)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show today's selection, generating and committing it if needed
    Daily {
        /// Generate for this date instead of today (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List committed selections, newest first
    History {
        #[arg(long, default_value_t = 10)]
        limit: u64,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// Download a module into the cache (or serve it from there)
    Fetch {
        module_id: u32,
        /// Also write the content to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Remove cache entries not accessed within the age limit
    Evict {
        /// Override the configured maximum age in days
        #[arg(long)]
        days: Option<u32>,
    },
    /// Record a personal 1-5 star rating for a module
    Rate {
        module_id: u32,
        /// Stars, 1 through 5
        score: u8,
        #[arg(long)]
        comment: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => Config::load_from_file(&path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Daily { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let database = Database::connect(&config.database).await?;
            let catalog: Arc<dyn CatalogSource> =
                Arc::new(ModArchiveClient::new(&config.source)?);
            let history = Arc::new(SelectionSeaOrmRepository::new(database.connection.clone()));
            let curator = Curator::new(catalog, history, config.curator.clone());

            match curator.generate_or_get_daily(date).await {
                Ok(selection) => print_selection(&selection),
                Err(CuratorError::Store(e)) => return Err(e).context("selection store failed"),
                Err(e) => {
                    // Source trouble: fall back to the most recent committed
                    // selection rather than leaving the day empty.
                    warn!("Could not generate selection for {}: {}", date, e);
                    match curator.fallback_selection(date).await? {
                        Some(previous) => {
                            info!("Falling back to selection from {}", previous.date);
                            print_selection(&previous);
                        }
                        None => {
                            error!("No previous selection available to fall back to");
                            return Err(e.into());
                        }
                    }
                }
            }
        }
        Command::History { limit, offset } => {
            let database = Database::connect(&config.database).await?;
            let history = SelectionSeaOrmRepository::new(database.connection.clone());
            let catalog: Arc<dyn CatalogSource> =
                Arc::new(ModArchiveClient::new(&config.source)?);
            let curator = Curator::new(catalog, Arc::new(history), config.curator.clone());

            let selections = curator.history(limit, offset).await?;
            if selections.is_empty() {
                println!("No selections committed yet.");
            }
            for selection in selections {
                print_selection(&selection);
                println!();
            }
        }
        Command::Fetch { module_id, out } => {
            let catalog: Arc<dyn CatalogSource> =
                Arc::new(ModArchiveClient::new(&config.source)?);
            let cache = ContentCache::new(catalog, &config.cache)?;

            let bytes = cache.get(module_id).await?;
            println!("Module {} cached ({} bytes)", module_id, bytes.len());
            if let Some(path) = out {
                std::fs::write(&path, &bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Written to {}", path.display());
            }
        }
        Command::Evict { days } => {
            let catalog: Arc<dyn CatalogSource> =
                Arc::new(ModArchiveClient::new(&config.source)?);
            let cache = ContentCache::new(catalog, &config.cache)?;

            let days = days.unwrap_or(config.cache.max_age_days);
            let report = cache.evict_older_than(days).await?;
            let stats = cache.stats().await?;
            println!(
                "Removed {} entries ({} bytes); {} entries remain ({} bytes)",
                report.removed_count, report.bytes_freed, stats.entry_count, stats.total_bytes
            );
        }
        Command::Rate {
            module_id,
            score,
            comment,
        } => {
            if !(1..=5).contains(&score) {
                anyhow::bail!("score must be between 1 and 5");
            }
            let database = Database::connect(&config.database).await?;
            let ratings = RatingSeaOrmRepository::new(database.connection.clone());
            let previous = ratings.get(module_id).await?;
            let rating = ratings.upsert(module_id, score, comment).await?;
            match previous {
                Some(previous) => println!(
                    "Updated rating for module {}: {} -> {} stars",
                    rating.module_id, previous.score, rating.score
                ),
                None => println!(
                    "Rated module {} with {} star{}",
                    rating.module_id,
                    rating.score,
                    if rating.score == 1 { "" } else { "s" }
                ),
            }
        }
    }

    Ok(())
}

fn print_selection(selection: &Selection) {
    println!(
        "Selection for {} ({} modules):",
        selection.date,
        selection.entries.len()
    );
    for entry in &selection.entries {
        let title = entry.item.title.as_deref().unwrap_or(&entry.item.filename);
        let artist = entry.item.artist.as_deref().unwrap_or("unknown artist");
        println!(
            "  {}. [{}] {} - {} (id {})",
            entry.position, entry.source_type, title, artist, entry.item.id
        );
    }
}
