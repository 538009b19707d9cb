//! Sale ingestion.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use super::{Result, Store, StoredSale};
use crate::extract::GradeSales;

impl Store {
    /// Upserts every extracted sale for an item in one transaction.
    ///
    /// The key is `(item, date, price, listing URL)`. Re-ingesting a known
    /// sale overwrites its grade and title and never adds a row. Returns the
    /// number of sales written.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if any write fails; the
    /// transaction is rolled back.
    #[instrument(skip(self, grades))]
    pub async fn upsert_sales(&self, item_id: i64, grades: &[GradeSales]) -> Result<u64> {
        let mut tx = self.db.pool().begin().await?;
        let mut written = 0u64;

        for grade in grades {
            for sale in &grade.sales {
                let result = sqlx::query(
                    r"INSERT INTO sales (item_id, grade, sale_date, price, listing_url, title)
                      VALUES (?, ?, ?, ?, ?, ?)
                      ON CONFLICT(item_id, sale_date, price, listing_url) DO UPDATE SET
                          grade = excluded.grade,
                          title = excluded.title",
                )
                .bind(item_id)
                .bind(&grade.grade)
                .bind(sale.date.format("%Y-%m-%d").to_string())
                .bind(sale.price)
                .bind(&sale.listing_url)
                .bind(&sale.title)
                .execute(&mut *tx)
                .await?;
                written += result.rows_affected();
            }
        }

        tx.commit().await?;
        debug!(item_id, written, "sales upserted");
        Ok(written)
    }

    /// All stored sales of an item, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the query fails.
    pub async fn sales_for_item(&self, item_id: i64) -> Result<Vec<StoredSale>> {
        let sales = sqlx::query_as::<_, StoredSale>(
            r"SELECT id, item_id, grade, sale_date, price, listing_url, title
              FROM sales WHERE item_id = ?
              ORDER BY sale_date ASC, id ASC",
        )
        .bind(item_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(sales)
    }

    /// Most recent sale price per grade.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the query fails.
    pub async fn latest_sale_prices(&self, item_id: i64) -> Result<BTreeMap<String, f64>> {
        let sales = self.sales_for_item(item_id).await?;
        // Oldest first, so later rows overwrite earlier ones.
        Ok(sales
            .into_iter()
            .map(|sale| (sale.grade, sale.price))
            .collect())
    }
}
