//! Market price estimation.
//!
//! - [`estimator`] - time-decayed weighted geometric mean for one sale list
//! - [`lookup`] - ordered key strategies for reading a grade's price
//!
//! Estimates are always recomputed from an item's full sale history; see
//! [`price_by_grade`].

pub mod estimator;
pub mod lookup;

use std::collections::BTreeMap;

pub use estimator::{
    DEFAULT_HALF_LIFE_DAYS, MarketPrice, SENTINEL_PRICE, SalePoint, compute_market_price,
};
pub use lookup::{DEFAULT_SERVICE, GradeLookup, KeyStrategy};

/// Groups graded sales and estimates each grade.
///
/// Sales with an empty grade label are skipped.
#[must_use]
pub fn price_by_grade<I>(sales: I, half_life_days: f64) -> BTreeMap<String, MarketPrice>
where
    I: IntoIterator<Item = (String, SalePoint)>,
{
    let mut grouped: BTreeMap<String, Vec<SalePoint>> = BTreeMap::new();
    for (grade, sale) in sales {
        if grade.trim().is_empty() {
            continue;
        }
        grouped.entry(grade).or_default().push(sale);
    }

    grouped
        .into_iter()
        .map(|(grade, sales)| {
            let estimate = compute_market_price(&sales, half_life_days);
            (grade, estimate)
        })
        .collect()
}
