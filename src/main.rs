mod cli;
mod config;
mod error;
mod git;
mod output;
mod providers;
mod status_filter;
mod summary;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;
use output::OutputFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    if cli.output_format() == OutputFormat::Pretty {
        output::print_banner();
    }

    info!("Starting circle v{}", env!("CARGO_PKG_VERSION"));
    cli.execute().await?;

    Ok(())
}
