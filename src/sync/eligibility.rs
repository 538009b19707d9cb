//! Eligible-item selection with keyset pagination.

use tracing::debug;

use crate::store::{EligibleItem, Result, Store};

/// Default minimum reference price for an item to be scraped.
pub const DEFAULT_ELIGIBILITY_THRESHOLD: f64 = 15.0;

/// Default page size of the eligibility scan.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Walks eligible items in id order, one page at a time.
///
/// Each page starts strictly after the last id seen, so rows inserted or
/// deleted mid-scan never shift the window. Rows inserted with higher ids
/// are still reached.
#[derive(Debug)]
pub struct EligibilityScanner<'a> {
    store: &'a Store,
    threshold: f64,
    page_size: u32,
    last_id: i64,
    exhausted: bool,
}

impl<'a> EligibilityScanner<'a> {
    /// Creates a scanner starting before the first id.
    #[must_use]
    pub fn new(store: &'a Store, threshold: f64, page_size: u32) -> Self {
        Self {
            store,
            threshold,
            page_size: page_size.max(1),
            last_id: 0,
            exhausted: false,
        }
    }

    /// The next page, or `None` once the scan is complete.
    ///
    /// # Errors
    ///
    /// Returns [`crate::store::StoreError::Database`] if the page query fails.
    pub async fn next_page(&mut self) -> Result<Option<Vec<EligibleItem>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .store
            .eligible_page(self.last_id, self.threshold, self.page_size)
            .await?;

        match page.last() {
            Some(last) => self.last_id = last.id,
            None => {
                self.exhausted = true;
                return Ok(None);
            }
        }
        debug!(count = page.len(), last_id = self.last_id, "eligibility page");
        Ok(Some(page))
    }
}

/// Collects every eligible item.
///
/// # Errors
///
/// Returns [`crate::store::StoreError::Database`] if a page query fails.
pub async fn collect_eligible(
    store: &Store,
    threshold: f64,
    page_size: u32,
) -> Result<Vec<EligibleItem>> {
    let mut scanner = EligibilityScanner::new(store, threshold, page_size);
    let mut items = Vec::new();
    while let Some(page) = scanner.next_page().await? {
        items.extend(page);
    }
    Ok(items)
}
