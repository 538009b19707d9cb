//! Import and export command handlers.

use anyhow::{Context, Result};
use pricewatch_core::store::Store;
use pricewatch_core::transfer::{FieldMapping, export_file, import_file, load_mapping};

use super::{CommandContext, ProcessExit};
use crate::cli::{ExportArgs, ImportArgs};

pub async fn run_import_command(ctx: &CommandContext, args: &ImportArgs) -> Result<ProcessExit> {
    let mapping = match &args.mapping {
        Some(path) => load_mapping(path)
            .with_context(|| format!("Failed to load mapping '{}'", path.display()))?,
        None => FieldMapping::default(),
    };

    let store = Store::new(ctx.open_database().await?);
    let summary = import_file(&store, &args.file, &mapping)
        .await
        .with_context(|| format!("Import of '{}' failed", args.file.display()))?;

    println!(
        "Imported {} cards into {} sets ({} entries skipped)",
        summary.items, summary.sets, summary.skipped
    );
    Ok(ProcessExit::Success)
}

pub async fn run_export_command(ctx: &CommandContext, args: &ExportArgs) -> Result<ProcessExit> {
    let store = Store::new(ctx.open_database().await?);
    let summary = export_file(&store, &args.file, args.with_sales)
        .await
        .with_context(|| format!("Export to '{}' failed", args.file.display()))?;

    println!(
        "Exported {} cards in {} sets to {}",
        summary.cards,
        summary.sets,
        args.file.display()
    );
    Ok(ProcessExit::Success)
}
