// src/error.rs

use std::any::Any;

/// Recoverable failure raised by a single source adapter.
///
/// These never escape a search: the task runner records them in the
/// per-source report and the remaining sources carry on.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Site structure changed: {0}")]
    Structure(String),

    #[error("Page is a CAPTCHA or bot challenge")]
    Blocked,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl AdapterError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AdapterError::Http(_) => "upstream_error",
            AdapterError::Status { .. } => "http_status",
            AdapterError::Parse(_) => "parse_error",
            AdapterError::Structure(_) => "site_changed",
            AdapterError::Blocked => "blocked",
            AdapterError::Timeout(_) => "timeout",
            AdapterError::Other(_) => "internal_error",
        }
    }
}

/// Request-level failure. Raised before any adapter runs.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No sources matched the selection [{}]", .requested.join(", "))]
    EmptySourceSelection { requested: Vec<String> },
}

impl SearchError {
    pub fn code_str(&self) -> &'static str {
        match self {
            SearchError::InvalidRequest(_) => "invalid_request",
            SearchError::EmptySourceSelection { .. } => "empty_source_selection",
        }
    }
}

/// Text of a panic payload, for reporting a crashed task or parse job.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_strings() {
        assert_eq!(AdapterError::Blocked.code_str(), "blocked");
        assert_eq!(
            AdapterError::Structure("grid missing".into()).code_str(),
            "site_changed"
        );
        let err = SearchError::EmptySourceSelection {
            requested: vec!["blocket".into(), "tradera".into()],
        };
        assert_eq!(err.code_str(), "empty_source_selection");
        assert_eq!(
            err.to_string(),
            "No sources matched the selection [blocket, tradera]"
        );
    }
}
