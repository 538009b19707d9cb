//! Full rebuild of the scrape queue from current eligibility.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use super::collisions::{CollisionReport, detect_collisions};
use super::eligibility::{DEFAULT_ELIGIBILITY_THRESHOLD, DEFAULT_PAGE_SIZE, collect_eligible};
use super::progress::{DEFAULT_BATCH_SIZE, ProgressError, ProgressQueue};
use crate::store::{Store, StoreError};

/// Errors from a resync run.
#[derive(Debug, Error)]
pub enum ResyncError {
    /// Reading eligible items failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Rebuilding the queue failed.
    #[error(transparent)]
    Progress(#[from] ProgressError),

    /// The collision report could not be written.
    #[error("failed to write collision report {path}: {message}")]
    Report {
        /// Report destination.
        path: PathBuf,
        /// Underlying error text.
        message: String,
    },
}

/// Resync settings.
#[derive(Debug, Clone)]
pub struct ResyncOptions {
    /// Minimum reference price.
    pub threshold: f64,
    /// Eligibility scan page size.
    pub page_size: u32,
    /// Rows per queue insert statement.
    pub batch_size: usize,
    /// Where to write the collision report, if anywhere.
    pub report_path: Option<PathBuf>,
}

impl Default for ResyncOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ELIGIBILITY_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            report_path: None,
        }
    }
}

/// Outcome of a resync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResyncSummary {
    /// Items at or above the threshold.
    pub eligible: usize,
    /// Items now pending in the queue.
    pub queued: u64,
    /// The collision partition.
    pub report: CollisionReport,
}

/// Clears the queue and refills it with every clean eligible item.
///
/// # Errors
///
/// Returns [`ResyncError`] when the scan, the queue rebuild or the report
/// write fails. A failed rebuild leaves the previous queue intact.
#[instrument(skip(store, queue, options), fields(threshold = options.threshold))]
pub async fn resync(
    store: &Store,
    queue: &ProgressQueue,
    options: &ResyncOptions,
) -> Result<ResyncSummary, ResyncError> {
    let eligible = collect_eligible(store, options.threshold, options.page_size).await?;
    let eligible_count = eligible.len();

    let report = detect_collisions(eligible);
    let ids: Vec<i64> = report.clean.iter().map(|item| item.id).collect();
    let queued = queue.rebuild(&ids, options.batch_size).await?;

    if let Some(path) = &options.report_path {
        write_report(path, &report).await?;
    }

    info!(
        eligible = eligible_count,
        queued,
        collision_groups = report.collisions.len(),
        excluded = report.excluded(),
        "resync complete"
    );

    Ok(ResyncSummary {
        eligible: eligible_count,
        queued,
        report,
    })
}

async fn write_report(path: &Path, report: &CollisionReport) -> Result<(), ResyncError> {
    let to_error = |message: String| ResyncError::Report {
        path: path.to_path_buf(),
        message,
    };
    let json = serde_json::to_vec_pretty(&report.collisions).map_err(|e| to_error(e.to_string()))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| to_error(e.to_string()))
}
