//! Pricewatch Core Library
//!
//! Scrapes graded sale listings and grading-census counts for collectible
//! cards from a pricing site, and turns them into one time-decayed market
//! price per card and grade.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - retrying, paced HTTP fetching behind the [`PageSource`] seam
//! - [`matcher`] - resolving a card to its canonical product page
//! - [`extract`] - sale tables, population census and listing pages
//! - [`pricing`] - the market price estimator and grade-key lookup
//! - [`store`] - sets, items, sales and estimates in SQLite
//! - [`sync`] - eligibility, collisions, the scrape queue and the worker pool
//! - [`transfer`] - bulk JSON import and export
//! - [`api`] - the single-item scrape endpoint
//! - [`config`] - TOML configuration merged over defaults
//! - [`db`] - database connection and migrations

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod db;
pub mod extract;
pub mod fetch;
pub mod matcher;
pub mod pricing;
pub mod store;
pub mod sync;
pub mod transfer;

// Re-export commonly used types
pub use config::{FileConfig, LoadedConfig, Settings, load_config};
pub use db::{Database, DbError};
pub use extract::{ParseError, PopulationReport, parse_product_page};
pub use fetch::{FetchError, Fetcher, FetcherOptions, PageSource, RateLimiter, RetryPolicy};
pub use matcher::{MatchError, Matcher};
pub use pricing::{GradeLookup, MarketPrice, SalePoint, compute_market_price};
pub use store::{Store, StoreError};
pub use sync::{
    CatalogSync, CycleError, CycleReport, ItemScraper, ProgressQueue, ScrapeStatus, Selection,
    SyncEngine, SyncStats,
};
pub use transfer::{FieldMapping, TransferError};
