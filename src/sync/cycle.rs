//! One item's scrape → extract → price → persist cycle.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::progress::{ProgressError, ProgressQueue, ScrapeStatus};
use crate::extract::{GradeTier, ParseError, default_grade_tiers, parse_product_page};
use crate::fetch::{FetchError, PageSource};
use crate::matcher::{MatchError, Matcher, canonicalize_url};
use crate::pricing::{DEFAULT_HALF_LIFE_DAYS, price_by_grade};
use crate::store::{CatalogItem, Store, StoreError};

/// Errors that abort one item's cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The product page could not be resolved.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// The product page could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The product page was not recognizable.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Persisting results failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The progress row refused a transition.
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

impl CycleError {
    /// True when the item or its product page does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Match(MatchError::NoCandidates { .. }) | Self::Store(StoreError::ItemNotFound(_)) => {
                true
            }
            Self::Match(MatchError::Fetch(e)) | Self::Fetch(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// True when a cycle already holds the item.
    #[must_use]
    pub fn is_already_scraping(&self) -> bool {
        matches!(self, Self::Progress(ProgressError::AlreadyScraping(_)))
    }
}

/// Extraction and pricing settings of a cycle.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Grade tiers to extract.
    pub tiers: Vec<GradeTier>,
    /// Estimator half-life in days.
    pub half_life_days: f64,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            tiers: default_grade_tiers(),
            half_life_days: DEFAULT_HALF_LIFE_DAYS,
        }
    }
}

/// Result of a completed cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// Item row id.
    pub item_id: i64,
    /// Stable external key.
    pub item_key: String,
    /// Display name.
    pub item_name: String,
    /// Sales found on the page.
    pub total_sales: usize,
    /// Census positions found on the page.
    pub pop_grades: usize,
    /// Sale rows written (inserted or refreshed).
    pub sales_saved: u64,
    /// Grades with a stored estimate.
    pub grades_priced: usize,
    /// Canonical product page.
    pub source_url: String,
}

/// Runs scrape cycles against one store and page source.
///
/// Cheap to clone; clones share the store pool and the source.
#[derive(Clone)]
pub struct ItemScraper {
    store: Store,
    progress: ProgressQueue,
    source: Arc<dyn PageSource>,
    matcher: Matcher,
    settings: ScrapeSettings,
}

impl std::fmt::Debug for ItemScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemScraper")
            .field("matcher", &self.matcher)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ItemScraper {
    /// Creates a scraper.
    #[must_use]
    pub fn new(
        store: Store,
        progress: ProgressQueue,
        source: Arc<dyn PageSource>,
        matcher: Matcher,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            store,
            progress,
            source,
            matcher,
            settings,
        }
    }

    /// The catalog store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The scrape queue.
    #[must_use]
    pub fn progress(&self) -> &ProgressQueue {
        &self.progress
    }

    /// Claims and scrapes one item by key, outside the queue.
    ///
    /// # Errors
    ///
    /// - [`CycleError::Store`] with [`StoreError::ItemNotFound`] for an unknown key
    /// - [`CycleError::Progress`] with [`ProgressError::AlreadyScraping`] while
    ///   another cycle holds the item
    /// - any error of [`ItemScraper::run_claimed`]
    #[instrument(skip(self))]
    pub async fn scrape_key(&self, item_key: &str) -> Result<CycleReport, CycleError> {
        let item = self.store.require_item(item_key).await?;
        self.progress.claim(item.item.id).await?;
        self.run_claimed(&item).await
    }

    /// Runs the cycle for an item already in `scraping`.
    ///
    /// Any failure marks the item failed before it is returned.
    ///
    /// # Errors
    ///
    /// Returns the first [`CycleError`] of the cycle.
    #[instrument(skip(self, item), fields(item_id = item.item.id, item_key = %item.item.item_key))]
    pub async fn run_claimed(&self, item: &CatalogItem) -> Result<CycleReport, CycleError> {
        match self.execute(item).await {
            Ok(report) => Ok(report),
            Err(error) => {
                let id = item.item.id;
                if let Err(mark_error) = self.progress.mark_failed(id, &error.to_string()).await {
                    warn!(item_id = id, error = %mark_error, "failed to mark item failed");
                }
                Err(error)
            }
        }
    }

    async fn execute(&self, catalog_item: &CatalogItem) -> Result<CycleReport, CycleError> {
        let item = &catalog_item.item;

        let url = match item.source_url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => url.to_string(),
            None => {
                self.matcher
                    .resolve_item(
                        &item.name,
                        item.serial_number.as_deref(),
                        catalog_item.set_name.as_deref(),
                    )
                    .await?
            }
        };
        debug!(url = %url, "fetching product page");

        let page = self.source.get(&url).await?;
        let source_url = canonicalize_url(&page.url);
        // Parsed synchronously; the document is not held across an await.
        let product = parse_product_page(&source_url, &page.body, &self.settings.tiers)?;
        let total_sales = product.total_sales();
        let pop_grades = product.population.len();

        let sales_saved = self.store.upsert_sales(item.id, &product.grades).await?;
        self.store
            .record_scrape(item.id, &source_url, &product.population)
            .await?;
        self.progress
            .advance(item.id, ScrapeStatus::Scraping, ScrapeStatus::Scraped)
            .await?;

        let stored = self.store.sales_for_item(item.id).await?;
        let estimates = price_by_grade(
            stored.iter().map(|sale| (sale.grade.clone(), sale.point())),
            self.settings.half_life_days,
        );
        self.store.replace_estimates(item.id, &estimates).await?;
        self.progress
            .advance(item.id, ScrapeStatus::Scraped, ScrapeStatus::Priced)
            .await?;

        self.progress
            .advance(item.id, ScrapeStatus::Priced, ScrapeStatus::Completed)
            .await?;

        info!(total_sales, pop_grades, sales_saved, grades = estimates.len(), "item priced");

        Ok(CycleReport {
            item_id: item.id,
            item_key: item.item_key.clone(),
            item_name: item.name.clone(),
            total_sales,
            pop_grades,
            sales_saved,
            grades_priced: estimates.len(),
            source_url,
        })
    }
}
