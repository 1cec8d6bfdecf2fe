//! Search execution engine.
//!
//! Fans a request out to every selected adapter on its own tokio task, waits
//! for all of them to reach a terminal outcome, then merges, filters and
//! sorts the listings.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::selection::resolve_sources;
use super::{pipeline, runner, AggregateResult, SearchRequest, SourceOutcome};
use crate::adapters::{parse, AdapterQuery};
use crate::error::SearchError;
use crate::settings::SearchSettings;
use crate::{Adapter, AdapterRegistry};

/// Engine for running one search across the registered adapters.
pub struct SearchEngine<'a> {
    registry: &'a AdapterRegistry,
    settings: SearchSettings,
}

impl<'a> SearchEngine<'a> {
    pub fn new(registry: &'a AdapterRegistry) -> Self {
        Self {
            registry,
            settings: SearchSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Execute a search.
    ///
    /// Only request-level problems are errors: a malformed request or a
    /// selection that resolves to no sources. Adapter failures and timeouts
    /// are reported per source in the result.
    pub async fn execute(&self, request: &SearchRequest) -> Result<AggregateResult, SearchError> {
        let start = Instant::now();
        request.validate()?;

        let resolved = resolve_sources(
            self.registry,
            request.include.as_deref(),
            request.exclude.as_deref(),
            self.settings.default_sources.as_deref(),
            self.settings.selection_conflict,
        )?;

        info!(
            target: "audiosearch.engine",
            query = %request.terms.join(" "),
            sources = ?resolved.ids(),
            timeout_ms = self.settings.timeout_ms,
            parse_threads = parse::parse_threads(),
            "search started"
        );

        let outcomes = self
            .fan_out(request.adapter_query(), &resolved.adapters)
            .await;

        let order = request.sort_order();
        let mut result = AggregateResult::new(request.terms.clone(), order);
        result.unknown_sources = resolved.unknown;
        result.date_window = request.date_window;

        for outcome in outcomes {
            info!(
                target: "audiosearch.engine",
                source = outcome.source(),
                status = outcome.status().as_str(),
                count = outcome.listings().len(),
                duration_ms = outcome.duration_ms(),
                "source finished"
            );
            result.add_outcome(outcome);
        }

        let merged = std::mem::take(&mut result.listings);
        let merged_count = merged.len();
        result.listings = pipeline::apply(merged, request.date_window, order, Utc::now());
        result.filtered_out = merged_count - result.listings.len();
        result.duration_ms = Some(start.elapsed().as_millis() as u64);

        if result.all_failed() {
            warn!(target: "audiosearch.engine", "every source failed");
        } else if result.has_failures() {
            let failed: Vec<&str> = result
                .failed_sources()
                .iter()
                .map(|r| r.source.as_str())
                .collect();
            debug!(
                target: "audiosearch.engine",
                ?failed,
                total = result.total_count(),
                "search finished with failures"
            );
        }

        Ok(result)
    }

    /// One task per adapter, all started together; returns outcomes in the
    /// order of `adapters`.
    async fn fan_out(
        &self,
        query: AdapterQuery,
        adapters: &[Arc<dyn Adapter>],
    ) -> Vec<SourceOutcome> {
        let query = Arc::new(query);
        let limit = Duration::from_millis(self.settings.timeout_ms);
        // A cap at or above the source count would never be reached.
        let permits = self
            .settings
            .max_concurrency
            .filter(|&n| n < adapters.len())
            .map(|n| Arc::new(Semaphore::new(n.clamp(1, Semaphore::MAX_PERMITS))));

        let (ids, handles): (Vec<_>, Vec<_>) = adapters
            .iter()
            .map(|adapter| {
                let adapter = Arc::clone(adapter);
                let query = Arc::clone(&query);
                let permits = permits.clone();
                let id = adapter.id();

                let handle = tokio::spawn(async move {
                    // Waiting for a permit does not count against the timeout.
                    let _permit = match permits {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    runner::run(adapter, query, limit).await
                });

                (id, handle)
            })
            .unzip();

        join_all(handles)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, id)| joined.unwrap_or_else(|err| runner::crashed(id, err, 0)))
            .collect()
    }
}
