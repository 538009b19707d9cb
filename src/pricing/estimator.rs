//! Time-decayed weighted geometric mean with liquidity dampening.
//!
//! Each sale is weighted by `2^(-days_since / half_life)`, where
//! `days_since` is measured back from the most recent sale. The fair price
//! is the weighted geometric mean of the prices. It is then scaled by
//! `min(1, sqrt(sum of weights))` so thin or stale histories pull the
//! estimate toward zero.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::extract::parse_sale_date;

/// Default decay half-life in days.
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 21.0;

/// Price reported when no estimate can be formed.
pub const SENTINEL_PRICE: f64 = -1.0;

/// One sale as seen by the estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalePoint {
    /// Sale date text, `YYYY-MM-DD` or `Mon D, YYYY`.
    pub date: String,
    /// Sale price.
    pub price: f64,
}

impl SalePoint {
    /// Creates a sale point.
    pub fn new(date: impl Into<String>, price: f64) -> Self {
        Self {
            date: date.into(),
            price,
        }
    }
}

/// Point estimate plus confidence diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    /// Dampened market price, or [`SENTINEL_PRICE`].
    pub price: f64,
    /// Number of sales the estimate was requested over.
    pub sample_size: usize,
    /// Sum of recency weights.
    pub effective_liquidity: f64,
    /// `min(1, sqrt(effective_liquidity))`.
    pub liquidity_factor: f64,
}

impl MarketPrice {
    /// The "no estimate" result.
    #[must_use]
    pub fn sentinel(sample_size: usize) -> Self {
        Self {
            price: SENTINEL_PRICE,
            sample_size,
            effective_liquidity: 0.0,
            liquidity_factor: 0.0,
        }
    }

    /// True when no estimate could be formed.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.price < 0.0
    }

    /// Undampened weighted geometric mean, when an estimate exists.
    #[must_use]
    pub fn fair_price(&self) -> Option<f64> {
        (!self.is_sentinel() && self.liquidity_factor > 0.0)
            .then(|| self.price / self.liquidity_factor)
    }
}

/// Computes the market price of a sale list.
///
/// Sales with an unparseable date or a non-positive price are ignored.
///
/// ```
/// use pricewatch_core::pricing::{SalePoint, compute_market_price};
///
/// let sales = vec![SalePoint::new("2024-11-03", 100.0), SalePoint::new("2024-11-03", 100.0)];
/// let estimate = compute_market_price(&sales, 21.0);
/// assert!((estimate.price - 100.0).abs() < 1e-9);
/// assert_eq!(estimate.sample_size, 2);
/// ```
#[must_use]
pub fn compute_market_price(sales: &[SalePoint], half_life_days: f64) -> MarketPrice {
    if sales.is_empty() {
        return MarketPrice::sentinel(0);
    }

    let parsed: Vec<(NaiveDate, f64)> = sales
        .iter()
        .filter(|sale| sale.price.is_finite() && sale.price > 0.0)
        .filter_map(|sale| parse_sale_date(&sale.date).map(|date| (date, sale.price)))
        .collect();

    let Some(latest) = parsed.iter().map(|(date, _)| *date).max() else {
        return MarketPrice::sentinel(0);
    };

    let weighted: Vec<(f64, f64)> = parsed
        .iter()
        .map(|(date, price)| {
            #[allow(clippy::cast_precision_loss)]
            let days_since = (latest - *date).num_days().max(0) as f64;
            ((-days_since / half_life_days).exp2(), *price)
        })
        .collect();

    let sum_weights: f64 = weighted.iter().map(|(weight, _)| weight).sum();
    if sum_weights <= 0.0 || !sum_weights.is_finite() {
        return MarketPrice::sentinel(parsed.len());
    }

    let weighted_log_sum: f64 = weighted
        .iter()
        .map(|(weight, price)| weight * price.ln())
        .sum();
    let fair_price = (weighted_log_sum / sum_weights).exp();
    let liquidity_factor = sum_weights.sqrt().min(1.0);

    MarketPrice {
        price: fair_price * liquidity_factor,
        sample_size: sales.len(),
        effective_liquidity: sum_weights,
        liquidity_factor,
    }
}
