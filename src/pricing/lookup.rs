//! Reading a grade's price through alternate key spellings.
//!
//! Estimates are keyed by the stored grade label (`"PSA 10"`, `"Ungraded"`),
//! while consumers ask for `"10"` or `10`. A [`GradeLookup`] tries an
//! ordered list of [`KeyStrategy`] forms and takes the first key present.

use std::collections::BTreeMap;

/// Service assumed for bare numeric grades.
pub const DEFAULT_SERVICE: &str = "PSA";

/// One way of spelling a requested grade as a storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStrategy {
    /// The requested label as given.
    Exact,
    /// Only the numeric part (`"PSA 10"` → `"10"`).
    Numeric,
    /// The numeric part prefixed with a grading service (`"10"` → `"PSA 10"`).
    Prefixed(String),
}

impl KeyStrategy {
    /// The key this strategy produces for `requested`, if it applies.
    #[must_use]
    pub fn key(&self, requested: &str) -> Option<String> {
        let requested = requested.trim();
        match self {
            Self::Exact => (!requested.is_empty()).then(|| requested.to_string()),
            Self::Numeric => numeric_part(requested).map(str::to_string),
            Self::Prefixed(service) => numeric_part(requested).map(|n| format!("{service} {n}")),
        }
    }
}

/// Trailing numeric grade of a label (`"PSA 9.5"` → `"9.5"`).
fn numeric_part(label: &str) -> Option<&str> {
    let candidate = label.rsplit(' ').next()?;
    candidate.parse::<f64>().ok().map(|_| candidate)
}

/// Ordered key strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeLookup {
    strategies: Vec<KeyStrategy>,
}

impl Default for GradeLookup {
    fn default() -> Self {
        Self::new(vec![
            KeyStrategy::Exact,
            KeyStrategy::Numeric,
            KeyStrategy::Prefixed(DEFAULT_SERVICE.to_string()),
        ])
    }
}

impl GradeLookup {
    /// Creates a lookup evaluating `strategies` in order.
    #[must_use]
    pub fn new(strategies: Vec<KeyStrategy>) -> Self {
        Self { strategies }
    }

    /// Candidate keys for `requested`, in strategy order, without repeats.
    #[must_use]
    pub fn keys(&self, requested: &str) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(self.strategies.len());
        for key in self.strategies.iter().filter_map(|s| s.key(requested)) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// First value stored under any candidate key.
    #[must_use]
    pub fn find<'a, V>(&self, map: &'a BTreeMap<String, V>, requested: &str) -> Option<&'a V> {
        self.keys(requested).iter().find_map(|key| map.get(key))
    }

    /// Export price for `requested`.
    ///
    /// A stored estimate wins. A sentinel or non-positive estimate reads as
    /// zero, and a zero falls back to the latest sale price for the grade.
    #[must_use]
    pub fn resolve_price(
        &self,
        estimates: &BTreeMap<String, f64>,
        latest_sales: &BTreeMap<String, f64>,
        requested: &str,
    ) -> f64 {
        let estimate = self
            .find(estimates, requested)
            .copied()
            .filter(|price| *price > 0.0)
            .unwrap_or(0.0);
        if estimate > 0.0 {
            return estimate;
        }
        self.find(latest_sales, requested)
            .copied()
            .filter(|price| *price > 0.0)
            .unwrap_or(0.0)
    }
}
