//! Diagnostic metadata returned alongside extracted rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which extraction strategy produced (or failed to produce) a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    KnownBackend,
    DiscoveredBackend,
    StaticHtml,
    HeadlessDom,
    #[default]
    None,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::KnownBackend => write!(f, "known_backend"),
            StrategyKind::DiscoveredBackend => write!(f, "discovered_backend"),
            StrategyKind::StaticHtml => write!(f, "static_html"),
            StrategyKind::HeadlessDom => write!(f, "headless_dom"),
            StrategyKind::None => write!(f, "none"),
        }
    }
}

/// How the country allow-list is enforced against a search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountryStrategy {
    /// One facet-filtered query sequence per country. Hits without a country
    /// take the requested one; hits echoing another country are still
    /// checked against the allow-list.
    ServerSide,
    /// One unfiltered query sequence, filtered locally on each hit's country.
    ClientSide,
}

impl std::fmt::Display for CountryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountryStrategy::ServerSide => write!(f, "server_side"),
            CountryStrategy::ClientSide => write!(f, "client_side"),
        }
    }
}

/// Key used in per-country maps when a query sequence ran without a country filter.
pub const ALL_COUNTRIES_KEY: &str = "*";

/// Observational record of one strategy attempt. Never affects row content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMeta {
    pub source: StrategyKind,
    /// `true` when the strategy applied to this event and ran to completion.
    pub supported: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub query_seed: String,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_strategy: Option<CountryStrategy>,
    #[serde(default)]
    pub hits_reported_by_country: BTreeMap<String, u64>,
    #[serde(default)]
    pub pages_fetched_by_country: BTreeMap<String, u32>,
    #[serde(default)]
    pub deduplicated: bool,
    #[serde(default)]
    pub rows: usize,
    #[serde(default)]
    pub dropped_by_country: usize,
    #[serde(default)]
    pub dropped_as_non_manufacturer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Earlier strategies that yielded no rows, in the order they ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<ExtractionMeta>,
}

impl ExtractionMeta {
    #[must_use]
    pub fn new(source: StrategyKind, host: &str) -> Self {
        Self {
            source,
            host: Some(host.to_owned()),
            ..Self::default()
        }
    }

    /// Attempt record for a strategy that did not apply to this event.
    #[must_use]
    pub fn skipped(source: StrategyKind, host: &str, note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::new(source, host)
        }
    }

    /// Attempt record for a strategy that applied but failed.
    #[must_use]
    pub fn failed(source: StrategyKind, host: &str, failure: impl std::fmt::Display) -> Self {
        Self {
            failure: Some(failure.to_string()),
            ..Self::new(source, host)
        }
    }
}
