//! Persistence for sets, items, sales and price estimates.
//!
//! - [`Store`] - typed operations over the shared [`Database`]
//! - [`models`] - row types
//! - [`StoreError`] - persistence failures with a classified [`DbErrorKind`]
//!
//! Writes are uniqueness-keyed upserts (sales, sets, items) or single-row
//! overwrites (item scrape fields). Estimates for an item are replaced as a
//! whole inside one transaction.
//!
//! Scrape progress lives in [`crate::sync::ProgressQueue`].

mod catalog;
mod error;
mod estimates;
pub mod models;
mod sales;

pub use error::{DbErrorKind, StoreError};
pub use models::{
    CatalogItem, DEFAULT_VARIANT, EligibleItem, Item, NewItem, PriceEstimate, Set, StoredSale,
    item_key_for,
};

use crate::db::Database;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Typed access to the catalog, sale and estimate tables.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
}

impl Store {
    /// Creates a store over `db`.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying database.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }
}
