//! Catalog discovery and harvesting from the source's listing pages.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::extract::{ListingPage, parse_listing_page, parse_set_links};
use crate::fetch::{FetchError, PageSource};
use crate::store::{NewItem, Set, Store, StoreError, item_key_for};

/// Default category page listing every set.
pub const DEFAULT_CATEGORY_PATH: &str = "/category/pokemon-cards";

/// Default path prefix of set listing links.
pub const DEFAULT_SET_PATH_PREFIX: &str = "/console/pokemon-";

/// Default label of the aggregate category link.
pub const DEFAULT_SKIP_LABEL: &str = "Pokemon Cards";

/// Upper bound on listing pages walked per set.
pub const DEFAULT_MAX_PAGES: usize = 200;

/// Errors from catalog sync.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A listing or category page could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Persisting sets or items failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A configured URL is unusable.
    #[error("invalid catalog URL: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// The set has no listing page to harvest.
    #[error(
        "set '{0}' has no listing URL\n  Suggestion: Run 'pricewatch catalog discover' first"
    )]
    MissingListing(String),

    /// No set with that name.
    #[error("set not found: {0}\n  Suggestion: Run 'pricewatch catalog discover' to list sets")]
    SetNotFound(String),
}

/// Where catalog pages live.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Site root.
    pub base_url: String,
    /// Category page path.
    pub category_path: String,
    /// Set link path prefix.
    pub set_path_prefix: String,
    /// Aggregate link label to ignore.
    pub skip_label: String,
    /// Page cap per set.
    pub max_pages: usize,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
            category_path: DEFAULT_CATEGORY_PATH.to_string(),
            set_path_prefix: DEFAULT_SET_PATH_PREFIX.to_string(),
            skip_label: DEFAULT_SKIP_LABEL.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Outcome of harvesting one set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    /// Listing pages fetched.
    pub pages: usize,
    /// Items upserted.
    pub items: usize,
}

/// Discovers sets and harvests their items.
#[derive(Clone)]
pub struct CatalogSync {
    store: Store,
    source: Arc<dyn PageSource>,
    base: Url,
    options: CatalogOptions,
}

impl std::fmt::Debug for CatalogSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogSync")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CatalogSync {
    /// Creates a catalog sync.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidUrl`] if the base URL does not parse.
    pub fn new(
        store: Store,
        source: Arc<dyn PageSource>,
        options: CatalogOptions,
    ) -> Result<Self, CatalogError> {
        let base = Url::parse(&options.base_url).map_err(|_| CatalogError::InvalidUrl {
            url: options.base_url.clone(),
        })?;
        Ok(Self {
            store,
            source,
            base,
            options,
        })
    }

    /// Reads the category page and upserts every set found.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Fetch`] or [`CatalogError::Store`].
    #[instrument(skip(self))]
    pub async fn discover_sets(&self) -> Result<Vec<Set>, CatalogError> {
        let url = self
            .base
            .join(&self.options.category_path)
            .map_err(|_| CatalogError::InvalidUrl {
                url: self.options.category_path.clone(),
            })?;
        let page = self.source.get(url.as_str()).await?;
        let page_url = Url::parse(&page.url).unwrap_or(url);

        let links = parse_set_links(
            &page.body,
            &page_url,
            &self.options.set_path_prefix,
            &self.options.skip_label,
        );

        let mut sets = Vec::with_capacity(links.len());
        for link in links {
            self.store.upsert_set(&link.name, Some(&link.url)).await?;
            if let Some(set) = self.store.find_set(&link.name).await? {
                sets.push(set);
            }
        }
        info!(sets = sets.len(), "sets discovered");
        Ok(sets)
    }

    /// Harvests the named set.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::SetNotFound`] for an unknown name, plus any
    /// error of [`CatalogSync::harvest_set`].
    pub async fn harvest_named(&self, name: &str) -> Result<HarvestSummary, CatalogError> {
        let set = self
            .store
            .find_set(name)
            .await?
            .ok_or_else(|| CatalogError::SetNotFound(name.to_string()))?;
        self.harvest_set(&set).await
    }

    /// Walks a set's listing pages and upserts each row as an item.
    ///
    /// The first page is a GET. Every further page is a form POST of the
    /// cursor token from the previous page. The walk ends when a page has no
    /// token or no rows.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::MissingListing`] when the set has no listing
    /// URL, [`CatalogError::Fetch`] or [`CatalogError::Store`].
    #[instrument(skip(self, set), fields(set = %set.name))]
    pub async fn harvest_set(&self, set: &Set) -> Result<HarvestSummary, CatalogError> {
        let listing_url = set
            .listing_url
            .as_deref()
            .ok_or_else(|| CatalogError::MissingListing(set.name.clone()))?;
        let listing_base = Url::parse(listing_url).map_err(|_| CatalogError::InvalidUrl {
            url: listing_url.to_string(),
        })?;

        let mut summary = HarvestSummary::default();
        let mut cursor: Option<String> = None;

        while summary.pages < self.options.max_pages {
            let page = match &cursor {
                None => self.source.get(listing_url).await?,
                Some(token) => {
                    self.source
                        .post_form(listing_url, &[("cursor", token.as_str())])
                        .await?
                }
            };
            summary.pages += 1;

            let ListingPage { rows, cursor: next } = parse_listing_page(&page.body, &listing_base);
            debug!(page = summary.pages, rows = rows.len(), "listing page");
            if rows.is_empty() {
                break;
            }

            for row in rows {
                let item = NewItem {
                    item_key: item_key_for(&row.product_id),
                    name: row.name,
                    serial_number: row.number,
                    set_id: Some(set.id),
                    source_url: Some(row.detail_url),
                    reference_price: row.price,
                };
                self.store.upsert_item(&item).await?;
                summary.items += 1;
            }

            match next {
                Some(token) => cursor = Some(token),
                None => break,
            }
        }

        info!(pages = summary.pages, items = summary.items, "set harvested");
        Ok(summary)
    }

    /// Harvests every stored set with a listing URL.
    ///
    /// # Errors
    ///
    /// Stops at the first failing set.
    pub async fn harvest_all(&self) -> Result<Vec<(String, HarvestSummary)>, CatalogError> {
        let mut results = Vec::new();
        for set in self.store.list_sets().await? {
            if set.listing_url.is_none() {
                continue;
            }
            let summary = self.harvest_set(&set).await?;
            results.push((set.name, summary));
        }
        Ok(results)
    }
}
