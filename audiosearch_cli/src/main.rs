use clap::Parser;
use owo_colors::OwoColorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so --output json/yaml stays machine-readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        Commands::Search(args) => search::run(&cli, args).await,
        Commands::Sources => sources::run(&cli),
        Commands::Config { action } => config::run(&cli, action),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        process::exit(1);
    }
}

/// Core events use `audiosearch.*` targets and `audiosearch_core::*` module
/// paths; the `audiosearch` prefix covers both.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "audiosearch=warn,audiosearch_cli=info",
        1 => "audiosearch=info,audiosearch_cli=info",
        _ => "audiosearch=debug,audiosearch_cli=debug",
    }
}
