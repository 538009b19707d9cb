//! Serve command handler: run the scrape endpoint.

use anyhow::{Result, bail};
use pricewatch_core::api;

use super::{CommandContext, ProcessExit};
use crate::cli::ServeArgs;

pub async fn run_serve_command(ctx: &CommandContext, args: &ServeArgs) -> Result<ProcessExit> {
    let bind = args.bind.as_deref().unwrap_or(&ctx.settings.bind);
    if bind.parse::<std::net::SocketAddr>().is_err() {
        bail!("Invalid bind address '{bind}'. Expected host:port, e.g. 127.0.0.1:8080");
    }

    let db = ctx.open_database().await?;
    let scraper = ctx.scraper(db, ctx.page_source()?)?;
    println!("Listening on http://{bind}");
    api::serve(scraper, bind).await?;
    Ok(ProcessExit::Success)
}
