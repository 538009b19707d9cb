//! Source URL collision detection.
//!
//! Two catalog items resolving to the same product page would overwrite each
//! other's sales and estimates. Every item sharing a normalized URL is held
//! back from the queue and reported instead.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::store::EligibleItem;

/// URL with its query string removed; blank URLs have no identity.
#[must_use]
pub fn normalize_source_url(url: &str) -> Option<String> {
    let base = url.split('?').next().unwrap_or_default().trim();
    (!base.is_empty()).then(|| base.to_string())
}

/// Items sharing one normalized source URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollisionGroup {
    /// Shared normalized URL.
    pub url: String,
    /// Every item resolving to it, in id order.
    pub items: Vec<EligibleItem>,
}

/// Result of partitioning eligible items.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollisionReport {
    /// Items safe to queue, in input order.
    pub clean: Vec<EligibleItem>,
    /// Colliding groups, in order of first appearance.
    pub collisions: Vec<CollisionGroup>,
}

impl CollisionReport {
    /// Number of items held back.
    #[must_use]
    pub fn excluded(&self) -> usize {
        self.collisions.iter().map(|group| group.items.len()).sum()
    }
}

/// Partitions `items` into clean items and collision groups.
///
/// Items without a source URL are always clean.
#[must_use]
pub fn detect_collisions(items: Vec<EligibleItem>) -> CollisionReport {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for url in items
        .iter()
        .filter_map(|item| item.source_url.as_deref().and_then(normalize_source_url))
    {
        *counts.entry(url).or_default() += 1;
    }

    let mut report = CollisionReport::default();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let url = item.source_url.as_deref().and_then(normalize_source_url);
        match url {
            Some(url) if counts.get(&url).copied().unwrap_or_default() > 1 => {
                let index = *group_index.entry(url.clone()).or_insert_with(|| {
                    report.collisions.push(CollisionGroup {
                        url,
                        items: Vec::new(),
                    });
                    report.collisions.len() - 1
                });
                report.collisions[index].items.push(item);
            }
            _ => report.clean.push(item),
        }
    }

    for group in &report.collisions {
        let keys: Vec<&str> = group.items.iter().map(|i| i.item_key.as_str()).collect();
        warn!(url = %group.url, items = ?keys, "source URL shared by several items; excluded");
    }

    report
}
