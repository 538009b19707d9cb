//! Grading census ("population report") extraction.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{element_text, static_selector};

static POPULATION_ROW: LazyLock<Selector> =
    LazyLock::new(|| static_selector("table.population tbody tr"));
static POPULATION_TABLE: LazyLock<Selector> =
    LazyLock::new(|| static_selector("table.population"));
static NUMERIC_CELL: LazyLock<Selector> = LazyLock::new(|| static_selector("td.numeric"));

/// Census counts keyed by 1-based column position.
///
/// Replaced wholesale on every scrape. Serializes as a JSON object
/// (`{"1": 1024, "2": 12}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PopulationReport(BTreeMap<u32, u64>);

impl PopulationReport {
    /// Number of grade positions with a count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the page had no census data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Count at a 1-based position.
    #[must_use]
    pub fn get(&self, position: u32) -> Option<u64> {
        self.0.get(&position).copied()
    }

    /// Iterates `(position, count)` in position order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.0.iter().map(|(position, count)| (*position, *count))
    }
}

impl FromIterator<(u32, u64)> for PopulationReport {
    fn from_iter<T: IntoIterator<Item = (u32, u64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub(crate) fn has_population_table(document: &Html) -> bool {
    document.select(&POPULATION_TABLE).next().is_some()
}

/// Parses the first census row. No table yields an empty report.
#[must_use]
pub fn extract_population(document: &Html) -> PopulationReport {
    let Some(row) = document.select(&POPULATION_ROW).next() else {
        return PopulationReport::default();
    };

    row.select(&NUMERIC_CELL)
        .zip(1u32..)
        .filter_map(|(cell, position)| {
            let text = element_text(cell).replace(',', "");
            match text.parse::<u64>() {
                Ok(count) => Some((position, count)),
                Err(_) => {
                    debug!(position, %text, "skipping non-numeric population cell");
                    None
                }
            }
        })
        .collect()
}
