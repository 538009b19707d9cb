//! Catalog command handlers: set discovery and listing harvest.

use anyhow::{Context, Result};
use pricewatch_core::store::Store;
use pricewatch_core::sync::CatalogSync;
use tracing::warn;

use super::{CommandContext, ProcessExit, determine_exit_outcome};

async fn catalog_sync(ctx: &CommandContext) -> Result<(Store, CatalogSync)> {
    let store = Store::new(ctx.open_database().await?);
    let sync = CatalogSync::new(
        store.clone(),
        ctx.page_source()?,
        ctx.settings.catalog.clone(),
    )
    .context("Invalid catalog configuration")?;
    Ok((store, sync))
}

pub async fn run_catalog_discover_command(ctx: &CommandContext) -> Result<ProcessExit> {
    let (_, sync) = catalog_sync(ctx).await?;
    let sets = sync.discover_sets().await.context("Set discovery failed")?;
    for set in &sets {
        println!(
            "{}  {}",
            set.name,
            set.listing_url.as_deref().unwrap_or("-")
        );
    }
    println!("Discovered {} sets", sets.len());
    Ok(ProcessExit::Success)
}

pub async fn run_catalog_harvest_command(
    ctx: &CommandContext,
    set: Option<&str>,
) -> Result<ProcessExit> {
    let (store, sync) = catalog_sync(ctx).await?;

    if let Some(name) = set {
        let summary = sync
            .harvest_named(name)
            .await
            .with_context(|| format!("Harvest of '{name}' failed"))?;
        println!(
            "{name}: {} cards from {} pages",
            summary.items, summary.pages
        );
        return Ok(ProcessExit::Success);
    }

    let sets = store.list_sets().await?;
    let mut harvested = 0;
    let mut failed = 0;
    let mut cards = 0;
    for set in sets.iter().filter(|set| set.listing_url.is_some()) {
        match sync.harvest_set(set).await {
            Ok(summary) => {
                harvested += 1;
                cards += summary.items;
                println!(
                    "[ok] {}: {} cards from {} pages",
                    set.name, summary.items, summary.pages
                );
            }
            Err(error) => {
                failed += 1;
                warn!(set = %set.name, error = %error, "harvest failed");
                println!("[failed] {}: {error}", set.name);
            }
        }
    }

    println!("Harvested {cards} cards from {harvested} sets, {failed} failed");
    Ok(determine_exit_outcome(harvested, failed))
}
