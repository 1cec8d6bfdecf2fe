use crate::cli::{Cli, ConfigAction};
use crate::commands::{settings_store, CommandError, Result};
use crate::output::{format_output, OutputData};
use audiosearch_core::settings::SearchSettings;
use owo_colors::OwoColorize;

pub fn run(cli: &Cli, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => {
            println!("{}", settings_store(cli).path().display());
            Ok(())
        }
        ConfigAction::Init { force } => init_config(cli, *force),
    }
}

fn show_config(cli: &Cli) -> Result<()> {
    let store = settings_store(cli);
    let output_data = OutputData::Settings {
        path: store.path().display().to_string(),
        exists: store.exists(),
        settings: store.load(),
    };
    format_output(&output_data, &cli.output)
}

fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let store = settings_store(cli);
    if store.exists() && !force {
        return Err(CommandError::InvalidInput(format!(
            "{} already exists (use --force to overwrite)",
            store.path().display()
        )));
    }

    store.save(&SearchSettings::default())?;
    println!(
        "{} {}",
        "Wrote default settings to".green(),
        store.path().display().to_string().cyan()
    );
    Ok(())
}
