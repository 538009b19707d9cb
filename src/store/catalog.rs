//! Sets and items.

use sqlx::Row;
use tracing::instrument;

use super::{CatalogItem, EligibleItem, Item, NewItem, Result, Set, Store, StoreError};
use crate::extract::PopulationReport;

impl Store {
    /// Inserts a set or refreshes its listing URL, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the upsert fails.
    #[instrument(skip(self))]
    pub async fn upsert_set(&self, name: &str, listing_url: Option<&str>) -> Result<i64> {
        let row = sqlx::query(
            r"INSERT INTO sets (name, listing_url) VALUES (?, ?)
              ON CONFLICT(name) DO UPDATE SET
                  listing_url = COALESCE(excluded.listing_url, sets.listing_url)
              RETURNING id",
        )
        .bind(name)
        .bind(listing_url)
        .fetch_one(self.db.pool())
        .await?;
        Ok(row.get("id"))
    }

    /// Looks up a set by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_set(&self, name: &str) -> Result<Option<Set>> {
        let set = sqlx::query_as::<_, Set>("SELECT * FROM sets WHERE name = ?")
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(set)
    }

    /// All sets, by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn list_sets(&self) -> Result<Vec<Set>> {
        let sets = sqlx::query_as::<_, Set>("SELECT * FROM sets ORDER BY name")
            .fetch_all(self.db.pool())
            .await?;
        Ok(sets)
    }

    /// Inserts an item or refreshes its catalog fields, returning its id.
    ///
    /// A stored source URL is never replaced here, since it may have been
    /// resolved by a scrape. A missing reference price or set keeps the
    /// stored value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the upsert fails.
    #[instrument(skip(self, item), fields(item_key = %item.item_key))]
    pub async fn upsert_item(&self, item: &NewItem) -> Result<i64> {
        let row = sqlx::query(
            r"INSERT INTO items (item_key, name, serial_number, set_id, source_url, reference_price)
              VALUES (?, ?, ?, ?, ?, ?)
              ON CONFLICT(item_key) DO UPDATE SET
                  name = excluded.name,
                  serial_number = COALESCE(excluded.serial_number, items.serial_number),
                  set_id = COALESCE(excluded.set_id, items.set_id),
                  source_url = COALESCE(items.source_url, excluded.source_url),
                  reference_price = COALESCE(excluded.reference_price, items.reference_price),
                  updated_at = datetime('now')
              RETURNING id",
        )
        .bind(&item.item_key)
        .bind(&item.name)
        .bind(&item.serial_number)
        .bind(item.set_id)
        .bind(&item.source_url)
        .bind(item.reference_price)
        .fetch_one(self.db.pool())
        .await?;
        Ok(row.get("id"))
    }

    /// Item by key together with its set name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_item(&self, item_key: &str) -> Result<Option<CatalogItem>> {
        let item = sqlx::query_as::<_, CatalogItem>(
            r"SELECT items.*, sets.name AS set_name
              FROM items LEFT JOIN sets ON sets.id = items.set_id
              WHERE items.item_key = ?",
        )
        .bind(item_key)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(item)
    }

    /// Like [`Store::find_item`], but a missing key is an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] if no item has `item_key`.
    pub async fn require_item(&self, item_key: &str) -> Result<CatalogItem> {
        self.find_item(item_key)
            .await?
            .ok_or_else(|| StoreError::ItemNotFound(item_key.to_string()))
    }

    /// Item by row id together with its set name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn find_item_by_id(&self, id: i64) -> Result<Option<CatalogItem>> {
        let item = sqlx::query_as::<_, CatalogItem>(
            r"SELECT items.*, sets.name AS set_name
              FROM items LEFT JOIN sets ON sets.id = items.set_id
              WHERE items.id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(item)
    }

    /// Items of a set, highest reference price first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn items_in_set(&self, set_id: i64) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r"SELECT * FROM items WHERE set_id = ?
              ORDER BY COALESCE(reference_price, 0) DESC, id ASC",
        )
        .bind(set_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(items)
    }

    /// Overwrites the scrape-derived fields of an item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Encode`] if the report cannot be serialized, or
    /// [`StoreError::Database`] if the update fails.
    #[instrument(skip(self, population), fields(pop_grades = population.len()))]
    pub async fn record_scrape(
        &self,
        item_id: i64,
        source_url: &str,
        population: &PopulationReport,
    ) -> Result<()> {
        let json = serde_json::to_string(population).map_err(|e| StoreError::Encode {
            field: "population",
            message: e.to_string(),
        })?;
        sqlx::query(
            r"UPDATE items
              SET source_url = ?, population = ?, updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(source_url)
        .bind(json)
        .bind(item_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// One page of eligible items with `id > after_id`, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn eligible_page(
        &self,
        after_id: i64,
        threshold: f64,
        limit: u32,
    ) -> Result<Vec<EligibleItem>> {
        let items = sqlx::query_as::<_, EligibleItem>(
            r"SELECT id, item_key, name, source_url FROM items
              WHERE id > ? AND reference_price >= ?
              ORDER BY id ASC
              LIMIT ?",
        )
        .bind(after_id)
        .bind(threshold)
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;
        Ok(items)
    }
}
