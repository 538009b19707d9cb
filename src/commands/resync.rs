//! Resync command handler: rebuild the scrape queue.

use anyhow::{Context, Result};
use pricewatch_core::store::Store;
use pricewatch_core::sync::{ProgressQueue, resync};

use super::{CommandContext, ProcessExit};
use crate::cli::ResyncArgs;

pub async fn run_resync_command(ctx: &CommandContext, args: &ResyncArgs) -> Result<ProcessExit> {
    let db = ctx.open_database().await?;
    let mut options = ctx.settings.resync_options(args.report.clone());
    if let Some(threshold) = args.threshold {
        options.threshold = threshold;
    }

    let summary = resync(&Store::new(db.clone()), &ProgressQueue::new(db), &options)
        .await
        .context("Resync failed")?;

    for group in &summary.report.collisions {
        let keys: Vec<&str> = group.items.iter().map(|item| item.item_key.as_str()).collect();
        println!("collision {} -> {}", group.url, keys.join(", "));
    }
    println!(
        "Queued {} of {} eligible cards (threshold {}); {} held back in {} collision groups",
        summary.queued,
        summary.eligible,
        options.threshold,
        summary.report.excluded(),
        summary.report.collisions.len()
    );
    if let Some(path) = &options.report_path {
        println!("Collision report written to {}", path.display());
    }

    Ok(ProcessExit::Success)
}
