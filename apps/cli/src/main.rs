//! logsweep CLI: sweep recent CI build failures into one health report.
//!
//! Lists jobs on a Jenkins server, scans the console logs of failed builds
//! inside a time window, and posts the aggregated report to Slack.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
