// src/lib.rs
pub mod adapters;
pub mod dates;
pub mod error;
pub mod listing;
pub mod search;
pub mod settings;
pub mod utils;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::adapters::{AdapterQuery, ListingSink};
use crate::error::AdapterError;
pub use crate::listing::{Listing, Price};
use crate::settings::SearchSettings;

/// The one capability every source exposes: search for listings.
///
/// Implementations must report ordinary failures (HTTP errors, timeouts,
/// markup changes) as `AdapterError`, never panic for them, and must not block
/// the async scheduler. Dropping the returned future abandons the fetch.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable source identifier used for selection and status reporting.
    fn id(&self) -> &'static str;

    /// Human-facing name, e.g. "HifiTorget".
    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Push listings for `query` into `sink` in the order the site returns them.
    ///
    /// Listings pushed before an error is returned are kept as a partial result.
    async fn search(&self, query: &AdapterQuery, sink: &mut ListingSink)
        -> Result<(), AdapterError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Fixed, ordered table of adapters.
///
/// Registration order is the default result order, so the table is a `Vec`
/// rather than a map. It is read-only while a search runs.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. An adapter with the same id is replaced in place.
    pub fn register(&mut self, adapter: impl Adapter + 'static) {
        self.register_arc(Arc::new(adapter));
    }

    pub fn register_arc(&mut self, adapter: Arc<dyn Adapter>) {
        match self.adapters.iter().position(|a| a.id() == adapter.id()) {
            Some(idx) => self.adapters[idx] = adapter,
            None => self.adapters.push(adapter),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Adapter>> {
        self.adapters.iter().find(|a| a.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Adapter>> {
        self.adapters.iter()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn list_adapters(&self) -> Vec<AdapterInfo> {
        self.adapters
            .iter()
            .map(|a| AdapterInfo {
                id: a.id().to_string(),
                name: a.display_name().to_string(),
                description: a.description().to_string(),
            })
            .collect()
    }
}

/// Build a registry holding only the adapters enabled via Cargo features,
/// in their fixed registration order.
pub fn build_registry_enabled_only(settings: &SearchSettings) -> AdapterRegistry {
    #[allow(unused_mut)]
    let mut registry = AdapterRegistry::new();

    #[cfg(feature = "hifitorget")]
    {
        match adapters::hifitorget::HifiTorgetAdapter::new(&settings.user_agent) {
            Ok(adapter) => registry.register(adapter),
            Err(e) => tracing::warn!(source = "hifitorget", error = %e, "adapter unavailable"),
        }
    }

    #[cfg(feature = "taktoton")]
    {
        match adapters::taktoton::TaktotonAdapter::new(&settings.user_agent) {
            Ok(adapter) => registry.register(adapter),
            Err(e) => tracing::warn!(source = "taktoton", error = %e, "adapter unavailable"),
        }
    }

    let _ = settings;
    registry
}
