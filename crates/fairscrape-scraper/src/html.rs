//! Heuristic exhibitor names from raw HTML and rendered DOM text.
//!
//! Both fallbacks only yield company names. Rows built from them carry no
//! country, website, or activity.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;
use std::time::Duration;

use fairscrape_core::ExhibitorRow;
use regex::Regex;
use reqwest::Client;

use crate::error::{body_excerpt, ExtractError};
use crate::retry::{classify_extract_error, parse_retry_after, retry_with_backoff, RetryPolicy};

/// Event pages commonly hide listings from non-browser agents.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Maximum names returned by [`anchor_names`].
pub const MAX_ANCHOR_NAMES: usize = 2000;

const NAV_WORDS: &[&str] = &[
    "home", "inicio", "about", "contact", "privacy", "cookies", "login", "menu",
];

static EXHIBITOR_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:exhibitors?|expositor(?:es)?|exposants?|aussteller|companies|empresas)\b")
        .expect("valid exhibitor hint regex")
});

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<a\b[^>]*>([^<]{2,120})</a>").expect("valid anchor regex")
});

static NUMERIC_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("valid numeric entity regex")
});

/// Fetches event pages for the static HTML strategy.
pub struct HtmlFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HtmlFetcher {
    /// # Errors
    ///
    /// Returns [`ExtractError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(BROWSER_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client, retry })
    }

    /// GETs `url` and returns the body, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::UpstreamQueryFailed`] for HTTP status 400 and above.
    /// - [`ExtractError::Http`] for transport failures after retries.
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, ExtractError> {
        retry_with_backoff(&self.retry, classify_extract_error, || async move {
            let response = self
                .client
                .get(url)
                .timeout(timeout)
                .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
                .send()
                .await?;
            let status = response.status();
            let retry_after_secs = parse_retry_after(response.headers());
            let text = response.text().await?;

            if status.as_u16() >= 400 {
                return Err(ExtractError::UpstreamQueryFailed {
                    status: status.as_u16(),
                    body_excerpt: body_excerpt(&text),
                    retry_after_secs,
                });
            }
            tracing::debug!(url, status = status.as_u16(), bytes = text.len(), "fetched event page");
            Ok(text)
        })
        .await
    }
}

/// `true` when the page mentions exhibitors in any supported language.
#[must_use]
pub fn has_exhibitor_hint(html: &str) -> bool {
    EXHIBITOR_HINT_RE.is_match(html)
}

/// Candidate exhibitor names from plain-text anchors.
///
/// Text is entity-decoded and whitespace-collapsed, kept at 3..=80 chars,
/// stripped of navigation links, then returned unique and sorted.
#[must_use]
pub fn anchor_names(html: &str) -> Vec<String> {
    let names: BTreeSet<String> = ANCHOR_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| collapse_whitespace(&decode_entities(m.as_str())))
        .filter(|text| (3..=80).contains(&text.chars().count()))
        .filter(|text| !is_navigation(text))
        .collect();
    names.into_iter().take(MAX_ANCHOR_NAMES).collect()
}

/// Filters anchor texts read from a rendered page.
///
/// Keeps 4..=79 chars, drops navigation links, and deduplicates
/// case-insensitively in page order.
#[must_use]
pub fn dom_names(texts: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    texts
        .iter()
        .map(|t| collapse_whitespace(t))
        .filter(|text| (4..=79).contains(&text.chars().count()))
        .filter(|text| !is_navigation(text))
        .filter(|text| seen.insert(text.to_lowercase()))
        .collect()
}

/// Name-only rows.
#[must_use]
pub fn rows_from_names(names: Vec<String>) -> Vec<ExhibitorRow> {
    names
        .into_iter()
        .map(|company| ExhibitorRow {
            company,
            ..ExhibitorRow::default()
        })
        .collect()
}

fn is_navigation(text: &str) -> bool {
    let lowered = text.to_lowercase();
    NAV_WORDS.iter().any(|w| lowered.contains(w))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decodes the handful of entities that show up in anchor text.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    let numeric = NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse().ok(),
        };
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_owned(), String::from)
    });
    numeric
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
