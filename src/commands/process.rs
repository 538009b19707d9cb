//! Process command handler: drain the scrape queue with the worker pool.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use pricewatch_core::config::validate_workers;
use pricewatch_core::sync::{ItemOutcome, OutcomeHook, ScrapeStatus, Selection, SyncEngine};

use super::{CommandContext, ProcessExit, determine_exit_outcome};
use crate::cli::ProcessArgs;

fn selection_for(args: &ProcessArgs) -> Selection {
    match (&args.set, &args.item) {
        (_, Some(key)) => Selection::Item(key.clone()),
        (Some(set), None) => Selection::Set(set.clone()),
        (None, None) => Selection::All,
    }
}

fn outcome_line(outcome: &ItemOutcome) -> String {
    match outcome {
        ItemOutcome::Completed(report) => format!(
            "[ok] {} {}: {} sales, {} census grades, {} grades priced",
            report.item_key,
            report.item_name,
            report.total_sales,
            report.pop_grades,
            report.grades_priced
        ),
        ItemOutcome::Failed {
            item_id,
            item_key,
            error,
        } => {
            let label = item_key
                .clone()
                .unwrap_or_else(|| format!("item #{item_id}"));
            // Keep the per-item line to the first line of a multi-line error.
            let first_line = error.lines().next().unwrap_or_default();
            format!("[failed] {label}: {first_line}")
        }
    }
}

fn should_use_progress_bar(stderr_is_terminal: bool, quiet: bool) -> bool {
    stderr_is_terminal && !quiet
}

pub async fn run_process_command(
    ctx: &CommandContext,
    args: &ProcessArgs,
    quiet: bool,
) -> Result<ProcessExit> {
    let workers = args.workers.map_or(ctx.settings.workers, usize::from);
    validate_workers(workers)?;

    let db = ctx.open_database().await?;
    let scraper = ctx.scraper(db, ctx.page_source()?)?;
    let selection = selection_for(args);

    // Failed and stranded rows go back to pending when the run starts.
    let mut queued = 0;
    for status in [ScrapeStatus::Pending, ScrapeStatus::Failed, ScrapeStatus::Scraping] {
        queued += scraper.progress().count(status).await?;
    }
    if queued == 0 {
        println!("Nothing queued. Run 'pricewatch resync' to build the queue.");
        return Ok(ProcessExit::Success);
    }

    let bar = should_use_progress_bar(std::io::stderr().is_terminal(), quiet).then(|| {
        let bar = ProgressBar::new(u64::try_from(queued).unwrap_or(0));
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    });

    let hook_bar = bar.clone();
    let hook: OutcomeHook = Arc::new(move |outcome: &ItemOutcome| {
        let line = outcome_line(outcome);
        match &hook_bar {
            Some(bar) => {
                bar.inc(1);
                bar.println(line);
            }
            None => println!("{line}"),
        }
    });

    let engine = SyncEngine::new(workers)?;
    let stats = engine
        .process(&scraper, &selection, Some(hook))
        .await
        .context("Processing run failed")?;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    println!(
        "Processed {} cards: {} completed, {} failed",
        stats.total(),
        stats.completed(),
        stats.failed()
    );
    Ok(determine_exit_outcome(stats.completed(), stats.failed()))
}
