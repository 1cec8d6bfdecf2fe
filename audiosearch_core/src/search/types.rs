//! Core types for one search: the request, per-source outcomes and the
//! aggregate result handed to the presenter.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::adapters::AdapterQuery;
use crate::error::{AdapterError, SearchError};
use crate::listing::Listing;

/// Ordering applied to the merged listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Aggregation order: source registration order, then site order
    #[default]
    #[serde(alias = "default")]
    Relevance,
    Price,
    Date,
}

impl SortKey {
    /// Price sorts cheapest first, date sorts newest first.
    pub fn default_direction(self) -> SortDirection {
        match self {
            SortKey::Date => SortDirection::Desc,
            SortKey::Relevance | SortKey::Price => SortDirection::Asc,
        }
    }
}

impl FromStr for SortKey {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relevance" | "default" | "" => Ok(SortKey::Relevance),
            "price" => Ok(SortKey::Price),
            "date" => Ok(SortKey::Date),
            other => Err(SearchError::InvalidRequest(format!(
                "unknown sort key '{}' (expected relevance, price or date)",
                other
            ))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortKey::Relevance => "relevance",
            SortKey::Price => "price",
            SortKey::Date => "date",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Resolved sort key plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(key: SortKey) -> Self {
        Self {
            key,
            direction: key.default_direction(),
        }
    }

    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::new(SortKey::Relevance)
    }
}

/// "Only listings from the last N days".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateWindow {
    pub days: u32,
}

impl DateWindow {
    pub fn days(days: u32) -> Self {
        Self { days }
    }

    /// Oldest instant still inside the window.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(Duration::days(i64::from(self.days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// One user query plus options. Immutable while the search runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub terms: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,

    /// Search only these sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,

    /// Search every source except these
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_window: Option<DateWindow>,

    #[serde(default)]
    pub sort: SortKey,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirection>,
}

impl SearchRequest {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_include<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exclude<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.date_window = Some(DateWindow::days(days));
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn sort_order(&self) -> SortOrder {
        let order = SortOrder::new(self.sort);
        match self.direction {
            Some(direction) => order.with_direction(direction),
            None => order,
        }
    }

    /// Reject malformed requests before anything is spawned.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.terms.is_empty() {
            return Err(SearchError::InvalidRequest(
                "at least one search term is required".to_string(),
            ));
        }
        if self.terms.iter().any(|t| t.trim().is_empty()) {
            return Err(SearchError::InvalidRequest(
                "search terms must not be empty".to_string(),
            ));
        }
        if let Some(window) = self.date_window {
            if window.days == 0 {
                return Err(SearchError::InvalidRequest(
                    "date window must be a positive number of days".to_string(),
                ));
            }
        }
        for (key, value) in &self.params {
            if key.trim().is_empty() {
                return Err(SearchError::InvalidRequest(format!(
                    "filter parameter with empty name (value '{}')",
                    value
                )));
            }
        }
        Ok(())
    }

    /// The part of the request every adapter sees.
    pub fn adapter_query(&self) -> AdapterQuery {
        AdapterQuery {
            terms: self.terms.iter().map(|t| t.trim().to_string()).collect(),
            params: self.params.clone(),
        }
    }
}

/// Terminal state of one source for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Success,
    /// Some listings were collected before the adapter failed
    PartialFailure,
    TimedOut,
    Failed,
}

impl SourceStatus {
    pub fn is_success(self) -> bool {
        self == SourceStatus::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceStatus::Success => "success",
            SourceStatus::PartialFailure => "partial_failure",
            SourceStatus::TimedOut => "timed_out",
            SourceStatus::Failed => "failed",
        }
    }
}

/// Why a source did not fully succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    /// Stable machine code (`timeout`, `http_status`, `site_changed`, ...)
    pub code: String,
    pub message: String,
}

impl SourceFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new("timeout", format!("timed out after {}ms", timeout_ms))
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new("panic", message)
    }
}

impl From<&AdapterError> for SourceFailure {
    fn from(err: &AdapterError) -> Self {
        Self::new(err.code_str(), err.to_string())
    }
}

/// One adapter's result for one query.
///
/// Built once by the task runner and never mutated; `error` is present
/// exactly when the status is not `Success`, which the constructors enforce.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    source: String,
    status: SourceStatus,
    listings: Vec<Listing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<SourceFailure>,
    duration_ms: u64,
}

impl SourceOutcome {
    pub fn success(source: impl Into<String>, listings: Vec<Listing>, duration_ms: u64) -> Self {
        Self {
            source: source.into(),
            status: SourceStatus::Success,
            listings,
            error: None,
            duration_ms,
        }
    }

    pub fn partial(
        source: impl Into<String>,
        listings: Vec<Listing>,
        error: SourceFailure,
        duration_ms: u64,
    ) -> Self {
        Self {
            source: source.into(),
            status: SourceStatus::PartialFailure,
            listings,
            error: Some(error),
            duration_ms,
        }
    }

    pub fn timed_out(source: impl Into<String>, timeout_ms: u64, duration_ms: u64) -> Self {
        Self {
            source: source.into(),
            status: SourceStatus::TimedOut,
            listings: Vec::new(),
            error: Some(SourceFailure::timeout(timeout_ms)),
            duration_ms,
        }
    }

    pub fn failed(source: impl Into<String>, error: SourceFailure, duration_ms: u64) -> Self {
        Self {
            source: source.into(),
            status: SourceStatus::Failed,
            listings: Vec::new(),
            error: Some(error),
            duration_ms,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn status(&self) -> SourceStatus {
        self.status
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn error(&self) -> Option<&SourceFailure> {
        self.error.as_ref()
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Split into the status report and the listings it contributed.
    pub fn into_parts(self) -> (SourceReport, Vec<Listing>) {
        let report = SourceReport {
            source: self.source,
            status: self.status,
            count: self.listings.len(),
            error: self.error,
            duration_ms: self.duration_ms,
        };
        (report, self.listings)
    }
}

/// Per-source status line in the aggregate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    pub status: SourceStatus,
    /// Listings this source contributed before date filtering
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SourceFailure>,
    pub duration_ms: u64,
}

/// Merged, filtered and sorted listings plus the status of every source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    pub terms: Vec<String>,

    pub listings: Vec<Listing>,

    /// One report per resolved source, in registration order
    pub sources: Vec<SourceReport>,

    /// Include/exclude names that matched no registered source
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_sources: Vec<String>,

    /// Listings removed by the date window
    #[serde(default)]
    pub filtered_out: usize,

    pub sort: SortOrder,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_window: Option<DateWindow>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl AggregateResult {
    pub fn new(terms: Vec<String>, sort: SortOrder) -> Self {
        Self {
            terms,
            listings: Vec::new(),
            sources: Vec::new(),
            unknown_sources: Vec::new(),
            filtered_out: 0,
            sort,
            date_window: None,
            duration_ms: None,
        }
    }

    /// Fold one outcome in. Failed and timed-out sources add only a report.
    pub fn add_outcome(&mut self, outcome: SourceOutcome) {
        let (report, listings) = outcome.into_parts();
        self.listings.extend(listings);
        self.sources.push(report);
    }

    pub fn total_count(&self) -> usize {
        self.listings.len()
    }

    pub fn has_failures(&self) -> bool {
        self.sources.iter().any(|s| !s.status.is_success())
    }

    pub fn failed_sources(&self) -> Vec<&SourceReport> {
        self.sources
            .iter()
            .filter(|s| !s.status.is_success())
            .collect()
    }

    /// True when no source produced anything.
    pub fn all_failed(&self) -> bool {
        !self.sources.is_empty()
            && self
                .sources
                .iter()
                .all(|s| matches!(s.status, SourceStatus::Failed | SourceStatus::TimedOut))
    }

    pub fn report_for(&self, source: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == source)
    }

    pub fn query(&self) -> String {
        self.terms.join(" ")
    }
}
