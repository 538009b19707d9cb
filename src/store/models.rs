//! Row types for the catalog, sales and estimate tables.

use serde::Serialize;
use sqlx::FromRow;

use crate::extract::PopulationReport;
use crate::pricing::SalePoint;

/// Suffix of item keys created by catalog harvesting (`"<source id>:Normal"`).
pub const DEFAULT_VARIANT: &str = "Normal";

/// Builds an item key from a source product id.
#[must_use]
pub fn item_key_for(product_id: &str) -> String {
    format!("{product_id}:{DEFAULT_VARIANT}")
}

/// A named collection of items.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Set {
    /// Row id.
    pub id: i64,
    /// Unique display name.
    pub name: String,
    /// Source listing page used by catalog harvesting.
    pub listing_url: Option<String>,
    /// When the set was first stored.
    pub created_at: String,
}

/// A trackable catalog entry.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Item {
    /// Row id.
    pub id: i64,
    /// Stable external key.
    pub item_key: String,
    /// Display name.
    pub name: String,
    /// Serial number within the set (`"4/102"`).
    pub serial_number: Option<String>,
    /// Owning set.
    pub set_id: Option<i64>,
    /// Canonical product page, once known.
    pub source_url: Option<String>,
    /// Last known ungraded reference price.
    pub reference_price: Option<f64>,
    /// Last population report as JSON text.
    pub population: Option<String>,
    /// When the item was first stored.
    pub created_at: String,
    /// When the item row last changed.
    pub updated_at: String,
}

impl Item {
    /// Decodes the stored population report.
    ///
    /// Missing or malformed JSON yields an empty report.
    #[must_use]
    pub fn population_report(&self) -> PopulationReport {
        self.population
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default()
    }
}

/// An item joined with its set name.
#[derive(Debug, Clone, FromRow)]
pub struct CatalogItem {
    /// The item row.
    #[sqlx(flatten)]
    pub item: Item,
    /// Name of the owning set, if any.
    pub set_name: Option<String>,
}

/// Fields for creating or refreshing an item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewItem {
    /// Stable external key.
    pub item_key: String,
    /// Display name.
    pub name: String,
    /// Serial number.
    pub serial_number: Option<String>,
    /// Owning set.
    pub set_id: Option<i64>,
    /// Product page; an already stored URL is kept.
    pub source_url: Option<String>,
    /// Reference price; `None` keeps the stored value.
    pub reference_price: Option<f64>,
}

/// Minimal item projection used by eligibility scans.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct EligibleItem {
    /// Row id.
    pub id: i64,
    /// Stable external key.
    pub item_key: String,
    /// Display name.
    pub name: String,
    /// Stored product page.
    pub source_url: Option<String>,
}

/// One stored sale.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredSale {
    /// Row id.
    pub id: i64,
    /// Owning item.
    pub item_id: i64,
    /// Grade label.
    pub grade: String,
    /// ISO date.
    pub sale_date: String,
    /// Sale price.
    pub price: f64,
    /// Marketplace listing URL.
    pub listing_url: String,
    /// Listing title.
    pub title: String,
}

impl StoredSale {
    /// The sale as estimator input.
    #[must_use]
    pub fn point(&self) -> SalePoint {
        SalePoint::new(self.sale_date.clone(), self.price)
    }
}

/// A stored per-grade estimate.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PriceEstimate {
    /// Owning item.
    pub item_id: i64,
    /// Grade label.
    pub grade: String,
    /// Dampened market price, `-1` when no estimate could be formed.
    pub price: f64,
    /// Number of sales considered.
    pub sample_size: i64,
    /// Sum of recency weights.
    pub effective_liquidity: f64,
    /// Liquidity dampening factor.
    pub liquidity_factor: f64,
    /// RFC 3339 computation time.
    pub computed_at: String,
}
