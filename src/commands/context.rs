//! Shared setup for command handlers: config, database and fetcher.

use std::sync::Arc;

use anyhow::{Context, Result};
use pricewatch_core::config::{LoadedConfig, Settings, load_config};
use pricewatch_core::fetch::{Fetcher, PageSource};
use pricewatch_core::matcher::Matcher;
use pricewatch_core::store::Store;
use pricewatch_core::sync::{ItemScraper, ProgressQueue};
use pricewatch_core::Database;
use tracing::debug;

use crate::cli::Cli;

/// Effective settings plus the process-wide resources built from them.
#[derive(Debug)]
pub struct CommandContext {
    /// Settings after config file and command-line overrides.
    pub settings: Settings,
    /// Where the settings came from.
    pub loaded: LoadedConfig,
    no_delay: bool,
}

impl CommandContext {
    /// Loads the config file and applies global command-line overrides.
    ///
    /// # Errors
    ///
    /// Fails when the config file is missing (explicit path) or invalid.
    pub fn load(cli: &Cli) -> Result<Self> {
        let loaded = load_config(cli.config.as_deref())?;
        let mut settings = Settings::from_file(loaded.config.as_ref());
        if let Some(db) = &cli.db {
            settings.db_path.clone_from(db);
        }
        debug!(
            config_loaded = loaded.loaded_from_file,
            db = %settings.db_path.display(),
            "settings resolved"
        );
        Ok(Self {
            settings,
            loaded,
            no_delay: cli.no_delay,
        })
    }

    /// Opens the database file, creating it and its schema if needed.
    pub async fn open_database(&self) -> Result<Database> {
        let path = &self.settings.db_path;
        Database::new(path)
            .await
            .with_context(|| format!("Failed to open database '{}'", path.display()))
    }

    /// Builds the one HTTP fetcher of this process.
    pub fn page_source(&self) -> Result<Arc<dyn PageSource>> {
        let fetcher = Fetcher::new(
            self.settings.fetcher_options(),
            Arc::new(self.settings.rate_limiter(self.no_delay)),
        )
        .context("Failed to build HTTP client")?;
        Ok(Arc::new(fetcher))
    }

    /// Builds the item scraper over `db` and `source`.
    pub fn scraper(&self, db: Database, source: Arc<dyn PageSource>) -> Result<ItemScraper> {
        let matcher = Matcher::new(Arc::clone(&source), &self.settings.base_url)
            .context("Invalid source base URL")?
            .with_detail_marker(self.settings.detail_marker.clone());
        Ok(ItemScraper::new(
            Store::new(db.clone()),
            ProgressQueue::new(db),
            source,
            matcher,
            self.settings.scrape_settings(),
        ))
    }
}
