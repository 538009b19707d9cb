//! CLI command handlers.

mod catalog;
mod config;
mod context;
mod process;
mod resync;
mod scrape;
mod serve;
mod transfer;

pub use catalog::{run_catalog_discover_command, run_catalog_harvest_command};
pub use config::run_config_show_command;
pub use context::CommandContext;
pub use process::run_process_command;
pub use resync::run_resync_command;
pub use scrape::run_scrape_command;
pub use serve::run_serve_command;
pub use transfer::{run_export_command, run_import_command};

/// Process outcome of a command, mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Everything succeeded.
    Success,
    /// Some items failed, some succeeded.
    Partial,
    /// Nothing succeeded.
    Failure,
}

impl ProcessExit {
    /// Exit code: 0 success, 2 partial, 1 failure.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

/// Determines the process exit outcome from completed and failed counts.
pub(crate) fn determine_exit_outcome(completed: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if completed > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}
