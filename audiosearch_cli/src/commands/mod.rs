pub mod config;
pub mod search;
pub mod sources;

use crate::cli::Cli;
use audiosearch_core::error::SearchError;
use audiosearch_core::settings::{SettingsError, SettingsStore};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Search(#[from] SearchError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("{failed} of {total} searches failed")]
    SearchesFailed { failed: usize, total: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// Settings store honoring `--config` / `AUDIOSEARCH_CONFIG`.
pub fn settings_store(cli: &Cli) -> SettingsStore {
    match &cli.config {
        Some(path) => SettingsStore::new(path.clone()),
        None => SettingsStore::new_default(),
    }
}
