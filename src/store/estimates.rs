//! Derived per-grade price estimates.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::instrument;

use super::{PriceEstimate, Result, Store};
use crate::pricing::MarketPrice;

impl Store {
    /// Replaces all estimates of an item in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if any write fails; the previous
    /// estimates are kept.
    #[instrument(skip(self, estimates), fields(grades = estimates.len()))]
    pub async fn replace_estimates(
        &self,
        item_id: i64,
        estimates: &BTreeMap<String, MarketPrice>,
    ) -> Result<()> {
        let computed_at = Utc::now().to_rfc3339();
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM price_estimates WHERE item_id = ?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        for (grade, estimate) in estimates {
            sqlx::query(
                r"INSERT INTO price_estimates
                    (item_id, grade, price, sample_size, effective_liquidity, liquidity_factor, computed_at)
                  VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(item_id)
            .bind(grade)
            .bind(estimate.price)
            .bind(i64::try_from(estimate.sample_size).unwrap_or(i64::MAX))
            .bind(estimate.effective_liquidity)
            .bind(estimate.liquidity_factor)
            .bind(&computed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Stored estimates of an item, by grade.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the query fails.
    pub async fn estimates_for_item(&self, item_id: i64) -> Result<Vec<PriceEstimate>> {
        let estimates = sqlx::query_as::<_, PriceEstimate>(
            "SELECT * FROM price_estimates WHERE item_id = ? ORDER BY grade",
        )
        .bind(item_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(estimates)
    }
}
