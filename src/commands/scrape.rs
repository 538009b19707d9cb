//! Scrape command handler: one card, outside the queue.

use anyhow::Result;
use tracing::warn;

use super::{CommandContext, ProcessExit};
use crate::cli::ScrapeArgs;

pub async fn run_scrape_command(ctx: &CommandContext, args: &ScrapeArgs) -> Result<ProcessExit> {
    let db = ctx.open_database().await?;
    let scraper = ctx.scraper(db, ctx.page_source()?)?;

    match scraper.scrape_key(args.item_key.trim()).await {
        Ok(report) => {
            println!("{} ({})", report.item_name, report.item_key);
            println!("  source_url = {}", report.source_url);
            println!("  total_sales = {}", report.total_sales);
            println!("  pop_grades = {}", report.pop_grades);
            println!("  sales_saved = {}", report.sales_saved);
            println!("  grades_priced = {}", report.grades_priced);
            Ok(ProcessExit::Success)
        }
        Err(error) => {
            warn!(item_key = %args.item_key, error = %error, "scrape failed");
            eprintln!("Error: {error}");
            Ok(ProcessExit::Failure)
        }
    }
}
