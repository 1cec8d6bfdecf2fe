use crate::cli::Cli;
use crate::commands::{settings_store, Result};
use crate::output::{format_output, OutputData};
use owo_colors::OwoColorize;

pub fn run(cli: &Cli) -> Result<()> {
    let settings = settings_store(cli).load();
    let registry = audiosearch_core::build_registry_enabled_only(&settings);
    let sources = registry.list_adapters();

    if sources.is_empty() {
        println!(
            "{}",
            "No sources compiled in. Rebuild with --features default-adapters.".yellow()
        );
        return Ok(());
    }

    format_output(&OutputData::SourceList(sources), &cli.output)
}
