mod app;
mod cli;
mod effects;

use clap::Parser;
use fanout_logging::{level_for_verbosity, LogDestination};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let destination = match &cli.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    fanout_logging::initialize(level_for_verbosity(cli.verbose), destination);

    // Per-URL failures are reported on stderr and never change the exit code.
    app::run(cli).await?;
    Ok(())
}
