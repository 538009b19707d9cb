//! CLI entry point for pricewatch.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod cli;
mod commands;

use cli::{CatalogCommand, Cli, Command, ConfigCommand};
use commands::{CommandContext, ProcessExit};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    debug!(?cli, "CLI arguments parsed");

    match run(&cli).await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}

async fn run(cli: &Cli) -> Result<ProcessExit> {
    let ctx = CommandContext::load(cli)?;

    match &cli.command {
        Command::Resync(args) => commands::run_resync_command(&ctx, args).await,
        Command::Process(args) => commands::run_process_command(&ctx, args, cli.quiet).await,
        Command::Scrape(args) => commands::run_scrape_command(&ctx, args).await,
        Command::Serve(args) => commands::run_serve_command(&ctx, args).await,
        Command::Catalog { command } => match command {
            CatalogCommand::Discover => commands::run_catalog_discover_command(&ctx).await,
            CatalogCommand::Harvest { set } => {
                commands::run_catalog_harvest_command(&ctx, set.as_deref()).await
            }
        },
        Command::Import(args) => commands::run_import_command(&ctx, args).await,
        Command::Export(args) => commands::run_export_command(&ctx, args).await,
        Command::Config { command } => match command {
            ConfigCommand::Show => commands::run_config_show_command(&ctx),
        },
    }
}
