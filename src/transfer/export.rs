//! Export of sets, items and per-grade prices.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{Result, TransferError};
use crate::pricing::GradeLookup;
use crate::store::{Item, Store};

/// One sale in an exported history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSale {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Sale price.
    pub price: f64,
}

/// One exported item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportCard {
    /// Stable item key.
    pub id: String,
    /// `"Name #Number"`, or the bare name.
    pub card: String,
    /// Reference price, zero when unknown.
    pub price: f64,
    /// Ungraded price.
    pub ungraded: f64,
    /// PSA 7 price.
    pub psa7: f64,
    /// PSA 8 price.
    pub psa8: f64,
    /// Grade 9 price.
    pub grade9: f64,
    /// PSA 10 price.
    pub psa10: f64,
    /// Sale history per grade, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales: Option<BTreeMap<String, Vec<ExportSale>>>,
}

/// One exported set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSet {
    /// Set name.
    pub name: String,
    /// Items, highest reference price first.
    pub cards: Vec<ExportCard>,
}

/// Outcome of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Sets written.
    pub sets: usize,
    /// Items written.
    pub cards: usize,
}

fn card_label(item: &Item) -> String {
    match item.serial_number.as_deref().filter(|n| !n.is_empty()) {
        Some(number) => format!("{} #{number}", item.name),
        None => item.name.clone(),
    }
}

async fn export_card(
    store: &Store,
    lookup: &GradeLookup,
    item: &Item,
    include_sales: bool,
) -> Result<ExportCard> {
    let estimates: BTreeMap<String, f64> = store
        .estimates_for_item(item.id)
        .await?
        .into_iter()
        .map(|estimate| (estimate.grade, estimate.price))
        .collect();
    let stored_sales = store.sales_for_item(item.id).await?;

    let mut latest = BTreeMap::new();
    let mut history: BTreeMap<String, Vec<ExportSale>> = BTreeMap::new();
    for sale in stored_sales {
        latest.insert(sale.grade.clone(), sale.price);
        if include_sales {
            history.entry(sale.grade).or_default().push(ExportSale {
                date: sale.sale_date,
                price: sale.price,
            });
        }
    }

    let grade_price = |grade: &str| lookup.resolve_price(&estimates, &latest, grade);

    Ok(ExportCard {
        id: item.item_key.clone(),
        card: card_label(item),
        price: item.reference_price.unwrap_or(0.0),
        ungraded: grade_price("Ungraded"),
        psa7: grade_price("7"),
        psa8: grade_price("8"),
        grade9: grade_price("9"),
        psa10: grade_price("10"),
        sales: (include_sales && !history.is_empty()).then_some(history),
    })
}

/// Builds the export document for every set that has items.
///
/// Sets are ordered by name. Each grade price is the stored estimate read
/// through `lookup`, falling back to the latest sale of that grade and then
/// to zero.
///
/// # Errors
///
/// Returns [`TransferError::Store`] if a read fails.
pub async fn build_export(
    store: &Store,
    lookup: &GradeLookup,
    include_sales: bool,
) -> Result<Vec<ExportSet>> {
    let mut sets = Vec::new();
    for set in store.list_sets().await? {
        let items = store.items_in_set(set.id).await?;
        if items.is_empty() {
            continue;
        }
        let mut cards = Vec::with_capacity(items.len());
        for item in &items {
            cards.push(export_card(store, lookup, item, include_sales).await?);
        }
        sets.push(ExportSet {
            name: set.name,
            cards,
        });
    }
    Ok(sets)
}

/// Writes the export document to `path` as pretty JSON.
///
/// # Errors
///
/// Returns [`TransferError::Store`] or [`TransferError::Io`].
#[instrument(skip(store), fields(path = %path.display()))]
pub async fn export_file(store: &Store, path: &Path, include_sales: bool) -> Result<ExportSummary> {
    let sets = build_export(store, &GradeLookup::default(), include_sales).await?;
    let summary = ExportSummary {
        sets: sets.len(),
        cards: sets.iter().map(|set| set.cards.len()).sum(),
    };

    let json = serde_json::to_vec_pretty(&sets).map_err(|e| TransferError::json(path, &e))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| TransferError::io(path, &e))?;

    info!(sets = summary.sets, cards = summary.cards, "export complete");
    Ok(summary)
}
