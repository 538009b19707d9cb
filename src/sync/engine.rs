//! Bounded worker pool over the scrape queue.
//!
//! # Concurrency Model
//!
//! - Each item cycle runs in its own Tokio task
//! - A semaphore permit is acquired before spawning each cycle
//! - Permits are released when the cycle finishes (RAII)
//! - Items are claimed with an atomic `UPDATE ... RETURNING`, so no two
//!   workers ever hold the same item
//!
//! A failed item is marked `failed` and counted. It never stops the run.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::cycle::{CycleReport, ItemScraper};
use super::progress::{DEFAULT_STALE_AFTER, ProgressError, Selection};

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
pub const MAX_WORKERS: usize = 4;

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 3;

/// Error type for engine runs.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid worker count provided.
    #[error(
        "invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}\n  Suggestion: Keep the pool small to stay polite to the source site"
    )]
    InvalidWorkers {
        /// The rejected value.
        value: usize,
    },

    /// Queue operation failed.
    #[error("queue error: {0}")]
    Progress(#[from] ProgressError),

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Outcome of one item, reported as soon as its cycle ends.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// The cycle completed.
    Completed(CycleReport),
    /// The cycle failed; the item is `failed`.
    Failed {
        /// Item row id.
        item_id: i64,
        /// Item key, when the item could be loaded.
        item_key: Option<String>,
        /// Error text.
        error: String,
    },
}

/// Callback invoked once per finished item.
pub type OutcomeHook = Arc<dyn Fn(&ItemOutcome) + Send + Sync>;

/// Statistics from one run.
///
/// Uses atomic counters for updates from concurrent cycle tasks.
#[derive(Debug, Default)]
pub struct SyncStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    reset: AtomicUsize,
}

impl SyncStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items whose cycle completed.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Items whose cycle failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Items processed (completed + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed()
    }

    /// Rows returned to pending at the start of the run.
    #[must_use]
    pub fn reset(&self) -> usize {
        self.reset.load(Ordering::SeqCst)
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runs queued item cycles under a worker bound.
#[derive(Debug)]
pub struct SyncEngine {
    semaphore: Arc<Semaphore>,
    workers: usize,
}

impl SyncEngine {
    /// Creates an engine with `workers` concurrent cycles.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidWorkers`] outside `1..=4`.
    ///
    /// ```
    /// use pricewatch_core::sync::SyncEngine;
    ///
    /// assert!(SyncEngine::new(3).is_ok());
    /// assert!(SyncEngine::new(0).is_err());
    /// ```
    pub fn new(workers: usize) -> Result<Self, EngineError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(EngineError::InvalidWorkers { value: workers });
        }
        debug!(workers, "creating sync engine");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
        })
    }

    /// Configured worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Processes every pending item matching `selection`.
    ///
    /// Failed rows, and in-flight rows older than [`DEFAULT_STALE_AFTER`],
    /// are returned to pending first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Progress`] if claiming items fails, or
    /// [`EngineError::SemaphoreClosed`]. Individual item failures do not
    /// error the run; they are counted in the stats.
    #[instrument(skip(self, scraper, hook))]
    pub async fn process(
        &self,
        scraper: &ItemScraper,
        selection: &Selection,
        hook: Option<OutcomeHook>,
    ) -> Result<SyncStats, EngineError> {
        let stats = Arc::new(SyncStats::new());
        let reset = scraper.progress().reset_for_next_run(DEFAULT_STALE_AFTER).await?;
        stats.reset.store(usize::try_from(reset).unwrap_or(usize::MAX), Ordering::SeqCst);
        let mut handles = Vec::new();

        info!(workers = self.workers, reset, "starting sync run");

        loop {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            let Some(item_id) = scraper.progress().dequeue(selection).await? else {
                break;
            };
            debug!(item_id, "dequeued item");

            let scraper = scraper.clone();
            let stats = Arc::clone(&stats);
            let hook = hook.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = run_item(&scraper, item_id).await;
                match &outcome {
                    ItemOutcome::Completed(report) => {
                        info!(item_id, item_key = %report.item_key, sales = report.total_sales, "item completed");
                        stats.increment_completed();
                    }
                    ItemOutcome::Failed { error, .. } => {
                        warn!(item_id, error = %error, "item failed");
                        stats.increment_failed();
                    }
                }
                if let Some(hook) = hook {
                    hook(&outcome);
                }
            }));
        }

        debug!(task_count = handles.len(), "waiting for cycles to finish");

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "cycle task panicked");
            }
        }

        let completed = stats.completed();
        let failed = stats.failed();
        info!(completed, failed, total = completed + failed, "sync run complete");

        match Arc::try_unwrap(stats) {
            Ok(stats) => Ok(stats),
            Err(shared) => {
                let copy = SyncStats::new();
                copy.completed.store(shared.completed(), Ordering::SeqCst);
                copy.failed.store(shared.failed(), Ordering::SeqCst);
                copy.reset.store(shared.reset(), Ordering::SeqCst);
                Ok(copy)
            }
        }
    }
}

async fn run_item(scraper: &ItemScraper, item_id: i64) -> ItemOutcome {
    let item = match scraper.store().find_item_by_id(item_id).await {
        Ok(Some(item)) => item,
        Ok(None) => {
            return fail_unloaded(scraper, item_id, "item row disappeared".to_string()).await;
        }
        Err(e) => return fail_unloaded(scraper, item_id, e.to_string()).await,
    };

    let item_key = item.item.item_key.clone();
    match scraper.run_claimed(&item).await {
        Ok(report) => ItemOutcome::Completed(report),
        Err(e) => ItemOutcome::Failed {
            item_id,
            item_key: Some(item_key),
            error: e.to_string(),
        },
    }
}

async fn fail_unloaded(scraper: &ItemScraper, item_id: i64, error: String) -> ItemOutcome {
    if let Err(e) = scraper.progress().mark_failed(item_id, &error).await {
        warn!(item_id, error = %e, "failed to mark item failed");
    }
    ItemOutcome::Failed {
        item_id,
        item_key: None,
        error,
    }
}
