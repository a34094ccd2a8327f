use serde::Serialize;
use thiserror::Error;

use crate::meta::ExtractionMeta;

/// Failure modes of the headless browser collaborator.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("browser task did not complete: {0}")]
    Join(String),
}

/// Why runtime backend discovery produced no usable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryFailure {
    #[error("no browser driver is configured")]
    BrowserUnavailable,

    #[error("page failed to load: {reason}")]
    PageLoadFailed { reason: String },

    #[error("page loaded but no search traffic was observed ({observed} requests seen)")]
    NoMatchingTraffic { observed: usize },

    #[error("search traffic observed but none of {candidates} candidates had a container id and credentials")]
    MissingCredentials { candidates: usize },
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("host {host} is not a known event and discovery failed: {discovery}")]
    UnsupportedHost {
        host: String,
        discovery: DiscoveryFailure,
    },

    #[error("backend discovery failed: {0}")]
    DiscoveryFailed(DiscoveryFailure),

    #[error("upstream request failed with HTTP {status}: {body_excerpt}")]
    UpstreamQueryFailed {
        status: u16,
        body_excerpt: String,
        retry_after_secs: Option<u64>,
    },

    #[error("malformed upstream response for {context}: {source}")]
    UpstreamMalformedResponse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no exhibitors found after {} extraction strategies", attempts.len())]
    NoResultsAfterAllStrategies { attempts: Vec<ExtractionMeta> },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid event URL \"{url}\": {reason}")]
    InvalidEventUrl { url: String, reason: String },

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
}

/// Maximum number of characters of an upstream body kept for diagnostics.
pub const BODY_EXCERPT_CHARS: usize = 400;

/// Truncates `body` to [`BODY_EXCERPT_CHARS`] characters on a char boundary.
#[must_use]
pub fn body_excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
