//! Per-item scrape progress and its state machine.
//!
//! ```text
//! Pending → Scraping → Scraped → Priced → Completed
//!              └──────────┴─────────┴──→ Failed → Pending
//! ```
//!
//! Every transition is a conditional `UPDATE ... WHERE status = ?`, so a row
//! only moves when it is in the expected source state. Competing workers
//! therefore never both claim one item.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::store::DbErrorKind;

/// Default number of rows per insert statement when rebuilding the queue.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Age after which an in-flight row counts as stranded.
///
/// Younger claims belong to a live cycle (a worker or the endpoint) and are
/// left alone by [`ProgressQueue::reset_for_next_run`].
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(15 * 60);

/// Scrape status of one item in the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    /// Waiting to be scraped.
    Pending,
    /// Claimed by a worker or the endpoint.
    Scraping,
    /// Sales and population stored.
    Scraped,
    /// Estimates recomputed.
    Priced,
    /// Cycle finished.
    Completed,
    /// Cycle aborted; retried on the next run.
    Failed,
}

impl ScrapeStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Scraping,
        Self::Scraped,
        Self::Priced,
        Self::Completed,
        Self::Failed,
    ];

    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scraping => "scraping",
            Self::Scraped => "scraped",
            Self::Priced => "priced",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// True when `self → next` is an edge of the state machine.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Failed, Self::Pending | Self::Scraping)
                | (Self::Scraping, Self::Scraped | Self::Pending)
                | (Self::Scraped, Self::Priced)
                | (Self::Priced, Self::Completed)
                | (Self::Scraping | Self::Scraped | Self::Priced, Self::Failed)
        )
    }

    /// True while a cycle holds the item.
    #[must_use]
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Scraping | Self::Scraped | Self::Priced)
    }

    /// The statuses a cycle can hold an item in.
    #[must_use]
    pub fn in_flight() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|status| status.is_in_flight())
    }
}

/// Appends `(?, ?, ...)` with one bound value per status.
fn push_status_list(
    builder: &mut QueryBuilder<'_, Sqlite>,
    statuses: impl Iterator<Item = ScrapeStatus>,
) {
    let mut list = builder.separated(", ");
    list.push_unseparated("(");
    for status in statuses {
        list.push_bind(status.as_str());
    }
    list.push_unseparated(")");
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ScrapeStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "scraping" => Ok(Self::Scraping),
            "scraped" => Ok(Self::Scraped),
            "priced" => Ok(Self::Priced),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid scrape status: {s}")),
        }
    }
}

/// Errors from progress queue operations.
#[derive(Debug, Clone, Error)]
pub enum ProgressError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification of the failure.
        kind: DbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// The row was not in the state the transition starts from.
    #[error("item {item_id}: cannot move from {from} to {to} (current: {current})")]
    InvalidTransition {
        /// Item row id.
        item_id: i64,
        /// Expected source state.
        from: ScrapeStatus,
        /// Requested target state.
        to: ScrapeStatus,
        /// Actual state, or `missing` when the item is not queued.
        current: String,
    },

    /// A cycle already holds the item.
    #[error(
        "item {0} is already being scraped\n  Suggestion: Wait for the running scrape to finish"
    )]
    AlreadyScraping(i64),
}

impl From<sqlx::Error> for ProgressError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

/// Result type for progress operations.
pub type Result<T> = std::result::Result<T, ProgressError>;

/// Which queued items a run processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every pending item.
    #[default]
    All,
    /// Pending items of the named set.
    Set(String),
    /// One pending item by key.
    Item(String),
}

/// One progress row.
#[derive(Debug, Clone, FromRow)]
pub struct ProgressEntry {
    /// Item row id.
    pub item_id: i64,
    /// Status text, parsed via [`ProgressEntry::status`].
    #[sqlx(rename = "status")]
    pub status_str: String,
    /// Number of times a cycle claimed the item.
    pub attempts: i64,
    /// Error text of the last failure.
    pub last_error: Option<String>,
    /// Last status change.
    pub updated_at: String,
}

impl ProgressEntry {
    /// Returns the parsed status, falling back to `Pending` for unknown text.
    #[must_use]
    pub fn status(&self) -> ScrapeStatus {
        self.status_str.parse().unwrap_or(ScrapeStatus::Pending)
    }
}

/// The scrape queue over `scrape_progress`.
#[derive(Debug, Clone)]
pub struct ProgressQueue {
    db: Database,
}

impl ProgressQueue {
    /// Creates a queue over `db`.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Replaces the whole queue with `item_ids`, all pending.
    ///
    /// Runs in one transaction: readers see either the old queue or the new
    /// one. Rows are inserted `batch_size` at a time.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Database`] if any statement fails; the old
    /// queue is kept.
    #[instrument(skip(self, item_ids), fields(items = item_ids.len()))]
    pub async fn rebuild(&self, item_ids: &[i64], batch_size: usize) -> Result<u64> {
        let mut tx = self.db.pool().begin().await?;

        let cleared = sqlx::query("DELETE FROM scrape_progress")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut inserted = 0u64;
        for chunk in item_ids.chunks(batch_size.max(1)) {
            let mut builder: QueryBuilder<'_, Sqlite> =
                QueryBuilder::new("INSERT INTO scrape_progress (item_id, status) ");
            builder.push_values(chunk, |mut row, item_id| {
                row.push_bind(*item_id)
                    .push_bind(ScrapeStatus::Pending.as_str());
            });
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        debug!(cleared, inserted, "scrape queue rebuilt");
        Ok(inserted)
    }

    /// Returns failed rows, and in-flight rows untouched for `stale_after`,
    /// to pending.
    ///
    /// A claim younger than `stale_after` is kept, so a run started next to
    /// a serving endpoint never takes over the endpoint's item.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn reset_for_next_run(&self, stale_after: Duration) -> Result<u64> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE scrape_progress SET status = ");
        builder
            .push_bind(ScrapeStatus::Pending.as_str())
            .push(", updated_at = datetime('now') WHERE status = ")
            .push_bind(ScrapeStatus::Failed.as_str())
            .push(" OR (status IN ");
        push_status_list(&mut builder, ScrapeStatus::in_flight());
        builder
            .push(" AND updated_at <= datetime('now', ")
            .push_bind(format!("-{} seconds", stale_after.as_secs()))
            .push("))");

        let result = builder.build().execute(self.db.pool()).await?;
        Ok(result.rows_affected())
    }

    /// Atomically claims the next pending item matching `selection`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn dequeue(&self, selection: &Selection) -> Result<Option<i64>> {
        let (filter, value) = match selection {
            Selection::All => ("", None),
            Selection::Set(name) => (
                "AND items.set_id = (SELECT id FROM sets WHERE name = ?)",
                Some(name.as_str()),
            ),
            Selection::Item(key) => ("AND items.item_key = ?", Some(key.as_str())),
        };

        let sql = format!(
            r"UPDATE scrape_progress
              SET status = ?, attempts = attempts + 1, updated_at = datetime('now')
              WHERE item_id = (
                  SELECT scrape_progress.item_id FROM scrape_progress
                  JOIN items ON items.id = scrape_progress.item_id
                  WHERE scrape_progress.status = ? {filter}
                  ORDER BY scrape_progress.item_id ASC
                  LIMIT 1
              )
              RETURNING item_id"
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql)
            .bind(ScrapeStatus::Scraping.as_str())
            .bind(ScrapeStatus::Pending.as_str());
        if let Some(value) = value {
            query = query.bind(value);
        }
        Ok(query.fetch_optional(self.db.pool()).await?)
    }

    /// Claims one item outside the queue, creating its row if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::AlreadyScraping`] if a cycle holds the item,
    /// or [`ProgressError::Database`] if the write fails.
    #[instrument(skip(self))]
    pub async fn claim(&self, item_id: i64) -> Result<()> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("INSERT INTO scrape_progress (item_id, status, attempts) VALUES (");
        builder
            .push_bind(item_id)
            .push(", ")
            .push_bind(ScrapeStatus::Scraping.as_str())
            .push(
                r", 1)
              ON CONFLICT(item_id) DO UPDATE SET
                  status = excluded.status,
                  attempts = scrape_progress.attempts + 1,
                  last_error = NULL,
                  updated_at = datetime('now')
              WHERE scrape_progress.status NOT IN ",
            );
        push_status_list(&mut builder, ScrapeStatus::in_flight());
        let result = builder.build().execute(self.db.pool()).await?;

        if result.rows_affected() == 0 {
            return Err(ProgressError::AlreadyScraping(item_id));
        }
        Ok(())
    }

    /// Moves an item from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::InvalidTransition`] if the edge is not part
    /// of the state machine or the row is not in `from`.
    #[instrument(skip(self))]
    pub async fn advance(&self, item_id: i64, from: ScrapeStatus, to: ScrapeStatus) -> Result<()> {
        if !from.can_transition_to(to) {
            return Err(self.invalid_transition(item_id, from, to).await);
        }

        let result = sqlx::query(
            r"UPDATE scrape_progress
              SET status = ?, updated_at = datetime('now')
              WHERE item_id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(item_id)
        .bind(from.as_str())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.invalid_transition(item_id, from, to).await);
        }
        Ok(())
    }

    /// Marks an in-flight item failed with `error`.
    ///
    /// Items that are not in flight are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Database`] if the update fails.
    #[instrument(skip(self, error))]
    pub async fn mark_failed(&self, item_id: i64, error: &str) -> Result<bool> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE scrape_progress SET status = ");
        builder
            .push_bind(ScrapeStatus::Failed.as_str())
            .push(", last_error = ")
            .push_bind(error)
            .push(", updated_at = datetime('now') WHERE item_id = ")
            .push_bind(item_id)
            .push(" AND status IN ");
        push_status_list(&mut builder, ScrapeStatus::in_flight());
        let result = builder.build().execute(self.db.pool()).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Progress row of an item.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Database`] if the query fails.
    pub async fn get(&self, item_id: i64) -> Result<Option<ProgressEntry>> {
        let entry =
            sqlx::query_as::<_, ProgressEntry>("SELECT * FROM scrape_progress WHERE item_id = ?")
                .bind(item_id)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(entry)
    }

    /// Every queued item id, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Database`] if the query fails.
    pub async fn item_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT item_id FROM scrape_progress ORDER BY item_id ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(ids)
    }

    /// Number of rows in `status`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Database`] if the query fails.
    pub async fn count(&self, status: ScrapeStatus) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM scrape_progress WHERE status = ?")
                .bind(status.as_str())
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    async fn invalid_transition(
        &self,
        item_id: i64,
        from: ScrapeStatus,
        to: ScrapeStatus,
    ) -> ProgressError {
        let current = match self.get(item_id).await {
            Ok(Some(entry)) => entry.status_str,
            Ok(None) => "missing".to_string(),
            Err(e) => return e,
        };
        ProgressError::InvalidTransition {
            item_id,
            from,
            to,
            current,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{NewItem, Store};

    async fn setup(keys: &[&str]) -> (Store, ProgressQueue, Vec<i64>) {
        let db = Database::new_in_memory().await.unwrap();
        let store = Store::new(db.clone());
        let mut ids = Vec::new();
        for key in keys {
            ids.push(
                store
                    .upsert_item(&NewItem {
                        item_key: (*key).to_string(),
                        name: (*key).to_string(),
                        ..NewItem::default()
                    })
                    .await
                    .unwrap(),
            );
        }
        (store, ProgressQueue::new(db), ids)
    }

    // ==================== Status ====================

    #[test]
    fn test_status_round_trips_through_text() {
        for status in ScrapeStatus::ALL {
            assert_eq!(status.as_str().parse::<ScrapeStatus>(), Ok(status));
        }
        assert!("in_progress".parse::<ScrapeStatus>().is_err());
    }

    #[test]
    fn test_state_machine_edges() {
        use ScrapeStatus::{Completed, Failed, Pending, Priced, Scraped, Scraping};
        assert!(Pending.can_transition_to(Scraping));
        assert!(Scraping.can_transition_to(Scraped));
        assert!(Scraped.can_transition_to(Priced));
        assert!(Priced.can_transition_to(Completed));
        assert!(Priced.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Scraped.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
    }

    // ==================== Queue ====================

    #[tokio::test]
    async fn test_rebuild_replaces_queue_in_batches() {
        let (_store, queue, ids) = setup(&["a", "b", "c", "d", "e"]).await;
        assert_eq!(queue.rebuild(&ids, 2).await.unwrap(), 5);
        queue.claim(ids[0]).await.unwrap();

        assert_eq!(queue.rebuild(&ids[3..], 2).await.unwrap(), 2);
        assert_eq!(queue.item_ids().await.unwrap(), ids[3..].to_vec());
        assert_eq!(queue.count(ScrapeStatus::Pending).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_dequeue_claims_each_item_once() {
        let (_store, queue, ids) = setup(&["a", "b"]).await;
        queue.rebuild(&ids, DEFAULT_BATCH_SIZE).await.unwrap();

        let first = queue.dequeue(&Selection::All).await.unwrap();
        let second = queue.dequeue(&Selection::All).await.unwrap();
        let third = queue.dequeue(&Selection::All).await.unwrap();
        assert_eq!(first, Some(ids[0]));
        assert_eq!(second, Some(ids[1]));
        assert_eq!(third, None);

        let entry = queue.get(ids[0]).await.unwrap().unwrap();
        assert_eq!(entry.status(), ScrapeStatus::Scraping);
        assert_eq!(entry.attempts, 1);
    }

    #[tokio::test]
    async fn test_dequeue_honours_selection() {
        let (store, queue, ids) = setup(&["a", "b", "c"]).await;
        let set_id = store.upsert_set("Jungle", None).await.unwrap();
        store
            .upsert_item(&NewItem {
                item_key: "c".to_string(),
                name: "c".to_string(),
                set_id: Some(set_id),
                ..NewItem::default()
            })
            .await
            .unwrap();
        queue.rebuild(&ids, DEFAULT_BATCH_SIZE).await.unwrap();

        let by_key = queue.dequeue(&Selection::Item("b".to_string())).await.unwrap();
        assert_eq!(by_key, Some(ids[1]));
        let by_set = queue.dequeue(&Selection::Set("Jungle".to_string())).await.unwrap();
        assert_eq!(by_set, Some(ids[2]));
        let none = queue.dequeue(&Selection::Set("Fossil".to_string())).await.unwrap();
        assert_eq!(none, None);
    }

    #[tokio::test]
    async fn test_full_cycle_and_guarded_transitions() {
        let (_store, queue, ids) = setup(&["a"]).await;
        let id = ids[0];
        queue.rebuild(&ids, DEFAULT_BATCH_SIZE).await.unwrap();
        assert_eq!(queue.dequeue(&Selection::All).await.unwrap(), Some(id));

        let skipped = queue
            .advance(id, ScrapeStatus::Scraped, ScrapeStatus::Priced)
            .await;
        assert!(matches!(
            skipped,
            Err(ProgressError::InvalidTransition { current, .. }) if current == "scraping"
        ));

        queue
            .advance(id, ScrapeStatus::Scraping, ScrapeStatus::Scraped)
            .await
            .unwrap();
        queue
            .advance(id, ScrapeStatus::Scraped, ScrapeStatus::Priced)
            .await
            .unwrap();
        queue
            .advance(id, ScrapeStatus::Priced, ScrapeStatus::Completed)
            .await
            .unwrap();
        assert_eq!(queue.count(ScrapeStatus::Completed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_and_stranded_rows_reset_to_pending() {
        let (_store, queue, ids) = setup(&["a", "b", "c"]).await;
        queue.rebuild(&ids, DEFAULT_BATCH_SIZE).await.unwrap();
        let failed = queue.dequeue(&Selection::All).await.unwrap().unwrap();
        assert!(queue.mark_failed(failed, "HTTP 500").await.unwrap());
        let _stranded = queue.dequeue(&Selection::All).await.unwrap().unwrap();

        assert_eq!(queue.reset_for_next_run(Duration::ZERO).await.unwrap(), 2);
        assert_eq!(queue.count(ScrapeStatus::Pending).await.unwrap(), 3);
        let entry = queue.get(failed).await.unwrap().unwrap();
        assert_eq!(entry.last_error.as_deref(), Some("HTTP 500"));
    }

    #[tokio::test]
    async fn test_reset_keeps_fresh_claims_in_flight() {
        let (_store, queue, ids) = setup(&["a", "b"]).await;
        queue.rebuild(&ids, DEFAULT_BATCH_SIZE).await.unwrap();
        let failed = queue.dequeue(&Selection::All).await.unwrap().unwrap();
        queue.mark_failed(failed, "HTTP 500").await.unwrap();
        queue.claim(ids[1]).await.unwrap();

        assert_eq!(queue.reset_for_next_run(DEFAULT_STALE_AFTER).await.unwrap(), 1);
        let held = queue.get(ids[1]).await.unwrap().unwrap();
        assert_eq!(held.status(), ScrapeStatus::Scraping);
        assert_eq!(queue.dequeue(&Selection::All).await.unwrap(), Some(failed));
        assert_eq!(queue.dequeue(&Selection::All).await.unwrap(), None);
    }

    #[test]
    fn test_in_flight_statuses() {
        let in_flight: Vec<ScrapeStatus> = ScrapeStatus::in_flight().collect();
        assert_eq!(
            in_flight,
            vec![ScrapeStatus::Scraping, ScrapeStatus::Scraped, ScrapeStatus::Priced]
        );
    }

    #[tokio::test]
    async fn test_claim_refuses_item_in_flight() {
        let (_store, queue, ids) = setup(&["a"]).await;
        let id = ids[0];

        queue.claim(id).await.unwrap();
        assert!(matches!(
            queue.claim(id).await,
            Err(ProgressError::AlreadyScraping(claimed)) if claimed == id
        ));

        queue.mark_failed(id, "boom").await.unwrap();
        queue.claim(id).await.unwrap();
        let entry = queue.get(id).await.unwrap().unwrap();
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.last_error, None);
    }

    #[tokio::test]
    async fn test_mark_failed_ignores_settled_rows() {
        let (_store, queue, ids) = setup(&["a"]).await;
        queue.rebuild(&ids, DEFAULT_BATCH_SIZE).await.unwrap();
        assert!(!queue.mark_failed(ids[0], "late").await.unwrap());
        assert_eq!(queue.count(ScrapeStatus::Pending).await.unwrap(), 1);
    }
}
