//! Sync coordination: eligibility, collisions, the scrape queue and the
//! worker pool that drives item cycles.
//!
//! - [`eligibility`] - keyset-paginated selection of items worth scraping
//! - [`collisions`] - holding back items that share a product page
//! - [`resync`] - clear-and-rebuild of the queue
//! - [`progress`] - the per-item state machine over `scrape_progress`
//! - [`cycle`] - one item's scrape → extract → price → persist cycle
//! - [`engine`] - bounded concurrent processing of the queue
//! - [`catalog`] - set discovery and listing harvest
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pricewatch_core::Database;
//! use pricewatch_core::fetch::{Fetcher, FetcherOptions, PageSource, RateLimiter};
//! use pricewatch_core::matcher::Matcher;
//! use pricewatch_core::store::Store;
//! use pricewatch_core::sync::{ItemScraper, ProgressQueue, ScrapeSettings, Selection, SyncEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new_in_memory().await?;
//! let source: Arc<dyn PageSource> =
//!     Arc::new(Fetcher::new(FetcherOptions::default(), Arc::new(RateLimiter::default()))?);
//! let matcher = Matcher::new(Arc::clone(&source), "https://www.pricecharting.com")?;
//! let scraper = ItemScraper::new(
//!     Store::new(db.clone()),
//!     ProgressQueue::new(db),
//!     source,
//!     matcher,
//!     ScrapeSettings::default(),
//! );
//! let stats = SyncEngine::new(3)?.process(&scraper, &Selection::All, None).await?;
//! println!("{} completed, {} failed", stats.completed(), stats.failed());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod collisions;
pub mod cycle;
pub mod eligibility;
pub mod engine;
pub mod progress;
pub mod resync;

pub use catalog::{CatalogError, CatalogOptions, CatalogSync, HarvestSummary};
pub use collisions::{CollisionGroup, CollisionReport, detect_collisions, normalize_source_url};
pub use cycle::{CycleError, CycleReport, ItemScraper, ScrapeSettings};
pub use eligibility::{
    DEFAULT_ELIGIBILITY_THRESHOLD, DEFAULT_PAGE_SIZE, EligibilityScanner, collect_eligible,
};
pub use engine::{
    DEFAULT_WORKERS, EngineError, ItemOutcome, MAX_WORKERS, MIN_WORKERS, OutcomeHook, SyncEngine,
    SyncStats,
};
pub use progress::{
    DEFAULT_BATCH_SIZE, DEFAULT_STALE_AFTER, ProgressEntry, ProgressError, ProgressQueue, ScrapeStatus, Selection,
};
pub use resync::{ResyncError, ResyncOptions, ResyncSummary, resync};
