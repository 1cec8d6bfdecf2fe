//! Concurrent search across every selected source.
//!
//! This module provides:
//! - `SearchRequest` / `AggregateResult`: what goes in and what comes out
//! - `runner::run`: one adapter call bounded by a timeout and an error boundary
//! - `SearchEngine`: fan-out/fan-in over the selected adapters
//! - `pipeline`: date-window filtering and stable sorting
//!
//! # Example
//!
//! ```ignore
//! use audiosearch_core::search::{SearchEngine, SearchRequest, SortKey};
//!
//! let engine = SearchEngine::new(&registry).with_settings(settings);
//! let request = SearchRequest::new(["yamaha receiver"])
//!     .with_include(["hifitorget", "taktoton"])
//!     .with_days(7)
//!     .with_sort(SortKey::Price);
//! let result = engine.execute(&request).await?;
//! ```

mod engine;
pub mod pipeline;
pub mod runner;
mod selection;
mod types;

pub use engine::SearchEngine;
pub use selection::{matches_source, resolve_sources, ResolvedSources, SelectionConflict};
pub use types::{
    AggregateResult, DateWindow, SearchRequest, SortDirection, SortKey, SortOrder,
    SourceFailure, SourceOutcome, SourceReport, SourceStatus,
};
