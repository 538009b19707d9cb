//! Config command handler: show effective configuration.

use anyhow::Result;

use super::{CommandContext, ProcessExit};

pub fn run_config_show_command(ctx: &CommandContext) -> Result<ProcessExit> {
    let resolved_path = ctx.loaded.path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    println!("config_path = {resolved_path}");
    println!(
        "config_file = {}",
        if ctx.loaded.loaded_from_file {
            "loaded"
        } else {
            "not found (using defaults)"
        }
    );
    for (key, value) in ctx.settings.display_pairs() {
        println!("{key} = {value}");
    }
    Ok(ProcessExit::Success)
}
