//! Research error types

use std::time::Duration;
use thiserror::Error;

/// Errors from a single research call (search, registry lookup, page fetch)
///
/// None of these are fatal: the aggregator logs them and carries on with less data.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("No search API configured. Set TAVILY_API_KEY, BRAVE_API_KEY, or SERPAPI_KEY environment variable.")]
    SearchNotConfigured,

    #[error("Unknown search provider: {0}")]
    UnknownProvider(String),

    #[error("Response too large ({0} bytes)")]
    TooLarge(usize),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Research task aborted: {0}")]
    Aborted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ResearchError::Status {
            status: 404,
            url: "https://pypi.org/pypi/nope/json".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404 from https://pypi.org/pypi/nope/json");
        assert!(ResearchError::SearchNotConfigured.to_string().contains("TAVILY_API_KEY"));
    }
}
