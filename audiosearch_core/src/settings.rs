//! Search settings and their on-disk store.
//!
//! Every field has a sensible default; the settings file is optional.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::adapters::DEFAULT_USER_AGENT;
use crate::search::{SelectionConflict, SortKey};

// ============================================================================
// Default Values
// ============================================================================

/// Default per-source timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// SearchSettings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Wall-clock limit for one adapter invocation (default: 60000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Cap on adapters running at once; queued adapters still get the full
    /// timeout once started (default: unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// What to do when both include and exclude lists are given
    #[serde(default)]
    pub selection_conflict: SelectionConflict,

    /// Sources searched when neither include nor exclude is given
    /// (default: every registered source)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sources: Option<Vec<String>>,

    #[serde(default)]
    pub default_sort: SortKey,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_days: Option<u32>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_concurrency: None,
            selection_conflict: SelectionConflict::default(),
            default_sources: None,
            default_sort: SortKey::default(),
            default_days: None,
            user_agent: default_user_agent(),
        }
    }
}

impl SearchSettings {
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    pub fn with_selection_conflict(mut self, conflict: SelectionConflict) -> Self {
        self.selection_conflict = conflict;
        self
    }

    pub fn with_default_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }
}

// ============================================================================
// SettingsStore
// ============================================================================

/// YAML settings file, by default at `~/.config/audiosearch/settings.yaml`.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new_default() -> Self {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        let path = base.join("audiosearch").join("settings.yaml");
        Self { path }
    }

    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load settings. A missing or malformed file yields defaults.
    pub fn load(&self) -> SearchSettings {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "ignoring malformed settings file");
                    SearchSettings::default()
                }
            },
            Err(_) => SearchSettings::default(),
        }
    }

    pub fn save(&self, settings: &SearchSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io(e.to_string()))?;
        }

        let content = serde_yaml::to_string(settings)
            .map_err(|e| SettingsError::Serialize(e.to_string()))?;

        std::fs::write(&self.path, content).map_err(|e| SettingsError::Io(e.to_string()))?;

        Ok(())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new_default()
    }
}

/// Errors from settings storage operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}
