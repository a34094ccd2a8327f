//! Pure analysis of observed browser traffic.
//!
//! Each observed request is parsed into a [`Candidate`] when its path looks
//! like a search-index query. Candidates are scored and the best usable one
//! becomes the discovered [`BackendConfig`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use crate::browser::ObservedRequest;
use crate::error::DiscoveryFailure;
use crate::types::{BackendConfig, BackendOrigin, QueryDialect, QueryStyle};

/// Index queried by the Easyfairs widgets proxy when the body does not name one.
pub const WIDGETS_INDEX_NAME: &str = "stands_relevance";

const APP_ID_HEADER: &str = "x-algolia-application-id";
const API_KEY_HEADER: &str = "x-algolia-api-key";

static CONTAINER_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)containerId\s*[:=]\s*(\d+)").expect("valid container id regex")
});

/// A search request recognized in the observed traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub url: String,
    pub dialect: QueryDialect,
    pub style: QueryStyle,
    pub app_id: Option<String>,
    pub api_key: Option<String>,
    pub index_name: Option<String>,
    pub container_id: Option<i64>,
}

impl Candidate {
    /// A candidate can be replayed only with a container id and index, and,
    /// against Algolia, both credentials.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        let has_target = self.container_id.is_some() && self.index_name.is_some();
        match self.dialect {
            QueryDialect::Widgets => has_target,
            QueryDialect::Algolia => has_target && self.app_id.is_some() && self.api_key.is_some(),
        }
    }

    fn into_backend(self) -> Option<BackendConfig> {
        Some(BackendConfig {
            container_id: self.container_id?,
            endpoint: Some(self.url),
            app_id: self.app_id,
            api_key: self.api_key,
            index_name: self.index_name?,
            dialect: self.dialect,
            style: self.style,
            origin: BackendOrigin::Discovered,
            language: None,
        })
    }
}

/// Recognizes a search-index query and extracts what it reveals.
#[must_use]
pub fn parse_candidate(request: &ObservedRequest) -> Option<Candidate> {
    let url = Url::parse(&request.url).ok()?;
    let path = url.path();

    let (dialect, style) = if path.contains("/widgets/api/stands") {
        (QueryDialect::Widgets, QueryStyle::Multi)
    } else if path.contains("/1/indexes/") {
        let trimmed = path.trim_end_matches('/');
        if trimmed.ends_with("/queries") {
            (QueryDialect::Algolia, QueryStyle::Multi)
        } else if trimmed.ends_with("/query") {
            (QueryDialect::Algolia, QueryStyle::Single)
        } else {
            return None;
        }
    } else {
        return None;
    };

    let query: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.into_owned()))
        .collect();
    let credential = |name: &str| {
        request
            .headers
            .get(name)
            .or_else(|| query.get(name))
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    };

    let app_id = credential(APP_ID_HEADER).or_else(|| match dialect {
        QueryDialect::Algolia => app_id_from_host(&url),
        QueryDialect::Widgets => None,
    });
    let api_key = credential(API_KEY_HEADER);

    let body = request
        .body
        .as_deref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok());
    let index_name = match style {
        QueryStyle::Single => index_from_path(path),
        QueryStyle::Multi => None,
    }
    .or_else(|| body.as_ref().and_then(index_from_body))
    .or_else(|| (dialect == QueryDialect::Widgets).then(|| WIDGETS_INDEX_NAME.to_owned()));

    let container_id = request
        .body
        .as_deref()
        .and_then(container_id_in)
        .or_else(|| container_id_in(&request.url));

    Some(Candidate {
        url: request.url.clone(),
        dialect,
        style,
        app_id,
        api_key,
        index_name,
        container_id,
    })
}

/// `<appid>-dsn.algolia.net` and `<appid>.algolia.net` encode the application id.
fn app_id_from_host(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if !host.contains("algolia") {
        return None;
    }
    let label = host.split('.').next()?;
    let app_id = label.split('-').next()?;
    (!app_id.is_empty()).then(|| app_id.to_ascii_uppercase())
}

fn index_from_path(path: &str) -> Option<String> {
    let rest = path.split("/1/indexes/").nth(1)?;
    let index = rest.split('/').next()?;
    if index.is_empty() || index == "*" {
        return None;
    }
    Some(percent_decode_str(index).decode_utf8_lossy().into_owned())
}

fn index_from_body(body: &Value) -> Option<String> {
    let entries: Vec<&Value> = match body {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => match obj.get("requests").and_then(Value::as_array) {
            Some(requests) => requests.iter().collect(),
            None => vec![body],
        },
        _ => return None,
    };
    entries
        .into_iter()
        .filter_map(|entry| entry.get("indexName").and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_owned)
}

/// Finds `containerId: <n>` in raw or percent-encoded text.
fn container_id_in(text: &str) -> Option<i64> {
    let spaced = text.replace('+', " ");
    let decoded: Cow<'_, str> = percent_decode_str(&spaced).decode_utf8_lossy();
    CONTAINER_ID_RE
        .captures(&decoded)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Ranks a candidate: +4 for a keyword in the index name, +2 for a
/// container id, +1 for an API key.
#[must_use]
pub fn score_candidate(candidate: &Candidate, keywords: &[String]) -> u32 {
    let mut score = 0;
    if let Some(index) = &candidate.index_name {
        let index = index.to_lowercase();
        if keywords.iter().any(|k| index.contains(&k.to_lowercase())) {
            score += 4;
        }
    }
    if candidate.container_id.is_some() {
        score += 2;
    }
    if candidate.api_key.is_some() {
        score += 1;
    }
    score
}

/// Picks the highest-scoring usable candidate; ties keep the first observed.
///
/// # Errors
///
/// - [`DiscoveryFailure::NoMatchingTraffic`] when no request looked like a search query.
/// - [`DiscoveryFailure::MissingCredentials`] when none of the matches is usable.
pub fn select_backend(
    observed: &[ObservedRequest],
    keywords: &[String],
) -> Result<BackendConfig, DiscoveryFailure> {
    let candidates: Vec<Candidate> = observed.iter().filter_map(parse_candidate).collect();
    if candidates.is_empty() {
        return Err(DiscoveryFailure::NoMatchingTraffic {
            observed: observed.len(),
        });
    }

    let total = candidates.len();
    let mut best: Option<(u32, Candidate)> = None;
    for candidate in candidates.into_iter().filter(Candidate::is_usable) {
        let score = score_candidate(&candidate, keywords);
        tracing::debug!(
            url = %candidate.url,
            index = candidate.index_name.as_deref(),
            container_id = candidate.container_id,
            score,
            "scored discovery candidate"
        );
        if best.as_ref().is_none_or(|(top, _)| score > *top) {
            best = Some((score, candidate));
        }
    }

    best.and_then(|(_, candidate)| candidate.into_backend())
        .ok_or(DiscoveryFailure::MissingCredentials { candidates: total })
}

#[cfg(test)]
#[path = "discovery_test.rs"]
mod tests;
