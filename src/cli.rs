//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Scrape graded card sales and estimate per-grade market prices.
///
/// Pricewatch keeps a local catalog of sets and cards, scrapes each card's
/// product page for graded sales and census counts, and stores one
/// time-decayed market price per grade.
#[derive(Parser, Debug)]
#[command(name = "pricewatch")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ./pricewatch.toml when present)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Database file (overrides `[database] path`)
    #[arg(long, value_name = "FILE", global = true)]
    pub db: Option<PathBuf>,

    /// Disable the randomized delay between requests
    #[arg(long, global = true)]
    pub no_delay: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rebuild the scrape queue from every eligible card
    Resync(ResyncArgs),

    /// Scrape and price the queued cards
    Process(ProcessArgs),

    /// Scrape and price one card now, regardless of the queue
    Scrape(ScrapeArgs),

    /// Serve the single-card scrape endpoint
    Serve(ServeArgs),

    /// Discover sets and harvest their cards
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },

    /// Import sets and cards from a JSON file
    Import(ImportArgs),

    /// Export sets, cards and per-grade prices to a JSON file
    Export(ExportArgs),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ResyncArgs {
    /// Write URL collision groups to this JSON file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Minimum reference price (overrides `[pricing] eligibility_threshold`)
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// Only cards of this set
    #[arg(long, value_name = "NAME", conflicts_with = "item")]
    pub set: Option<String>,

    /// Only the card with this key
    #[arg(long, value_name = "KEY")]
    pub item: Option<String>,

    /// Concurrent scrapes (1-4)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=4))]
    pub workers: Option<u8>,
}

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Card key, e.g. `4:Normal`
    pub item_key: String,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Listen address (overrides `[api] bind`)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CatalogCommand {
    /// Read the category page and record every set
    Discover,

    /// Walk set listing pages and record their cards
    Harvest {
        /// Only this set (default: every set with a listing page)
        #[arg(long, value_name = "NAME")]
        set: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// JSON document to import
    pub file: PathBuf,

    /// JSON field mapping (default: the export format)
    #[arg(long, value_name = "FILE")]
    pub mapping: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Destination JSON file
    pub file: PathBuf,

    /// Include each card's sale history per grade
    #[arg(long)]
    pub with_sales: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_a_subcommand() {
        let result = Cli::try_parse_from(["pricewatch"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let cli = Cli::try_parse_from(["pricewatch", "-v", "resync"]).unwrap();
        assert_eq!(cli.verbose, 1);

        let cli = Cli::try_parse_from(["pricewatch", "resync", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pricewatch",
            "process",
            "--db",
            "cards.db",
            "--config",
            "pw.toml",
            "--no-delay",
            "-q",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("cards.db")));
        assert_eq!(cli.config, Some(PathBuf::from("pw.toml")));
        assert!(cli.no_delay);
        assert!(cli.quiet);
    }

    #[test]
    fn test_cli_process_selection_and_workers() {
        let cli = Cli::try_parse_from(["pricewatch", "process", "--set", "Base Set", "-w", "2"])
            .unwrap();
        let Command::Process(args) = cli.command else {
            panic!("expected process");
        };
        assert_eq!(args.set.as_deref(), Some("Base Set"));
        assert_eq!(args.item, None);
        assert_eq!(args.workers, Some(2));
    }

    #[test]
    fn test_cli_process_rejects_set_with_item() {
        let result = Cli::try_parse_from([
            "pricewatch",
            "process",
            "--set",
            "Base Set",
            "--item",
            "4:Normal",
        ]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ArgumentConflict
        );
    }

    #[test]
    fn test_cli_workers_out_of_range_rejected() {
        let result = Cli::try_parse_from(["pricewatch", "process", "--workers", "5"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
    }

    #[test]
    fn test_cli_scrape_requires_key() {
        assert!(Cli::try_parse_from(["pricewatch", "scrape"]).is_err());
        let cli = Cli::try_parse_from(["pricewatch", "scrape", "4:Normal"]).unwrap();
        assert!(matches!(cli.command, Command::Scrape(ScrapeArgs { item_key }) if item_key == "4:Normal"));
    }

    #[test]
    fn test_cli_catalog_harvest_set() {
        let cli =
            Cli::try_parse_from(["pricewatch", "catalog", "harvest", "--set", "Jungle"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Catalog {
                command: CatalogCommand::Harvest { set: Some(ref name) }
            } if name == "Jungle"
        ));
    }

    #[test]
    fn test_cli_import_with_mapping() {
        let cli = Cli::try_parse_from([
            "pricewatch",
            "import",
            "cards.json",
            "--mapping",
            "flat.json",
        ])
        .unwrap();
        let Command::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.file, PathBuf::from("cards.json"));
        assert_eq!(args.mapping, Some(PathBuf::from("flat.json")));
    }

    #[test]
    fn test_cli_help_flag_returns_help_error() {
        let result = Cli::try_parse_from(["pricewatch", "--help"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::DisplayHelp
        );
    }

    #[test]
    fn test_cli_version_flag_returns_version_error() {
        let result = Cli::try_parse_from(["pricewatch", "--version"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::DisplayVersion
        );
    }

    #[test]
    fn test_cli_unknown_flag_returns_error() {
        let result = Cli::try_parse_from(["pricewatch", "resync", "--unknown-flag"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::UnknownArgument
        );
    }
}
