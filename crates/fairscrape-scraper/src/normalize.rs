//! Normalization from raw search hits to [`fairscrape_core::ExhibitorRow`].
//!
//! Upstream records are inconsistently shaped across events, so every
//! canonical field is looked up through a prioritized list of candidate
//! field names. Text values may be plain strings or language-keyed objects
//! (`{"es": "...", "en": "..."}`).

use std::collections::HashSet;
use std::sync::LazyLock;

use fairscrape_core::ExhibitorRow;
use regex::Regex;
use serde_json::Value;

const COMPANY_FIELDS: &[&str] = &["name", "companyName", "company", "title", "exhibitorName"];
const WEBSITE_FIELDS: &[&str] = &[
    "website",
    "websiteUrl",
    "web",
    "url",
    "companyWebsite",
    "homepage",
];
const DESCRIPTION_FIELDS: &[&str] = &["description", "descriptionText", "about", "summary"];
const COUNTRY_FIELDS: &[&str] = &["country", "countryName", "country_name"];
const OBJECT_ID_FIELDS: &[&str] = &["objectID", "id", "standId"];

/// Fallback language when the requested one has no text.
const FALLBACK_LANGUAGE: &str = "en";

/// Extensions that mark a URL as an asset rather than a company page.
const NON_PAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "svg", "webp", "bmp", "ico", "pdf", "doc", "docx", "xls", "xlsx",
    "ppt", "pptx", "zip", "mp4",
];

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:https?://|\bwww\.)[^\s<>"'\[\]{}|\\^`]+"#).expect("valid url regex")
});

/// Normalizes one raw hit into an [`ExhibitorRow`].
///
/// `query_country` is the country facet the hit was fetched under, used only
/// when the hit carries no country of its own. Pure: the same hit always
/// yields the same row.
#[must_use]
pub fn normalize_hit(hit: &Value, language: &str, query_country: Option<&str>) -> ExhibitorRow {
    let company = first_text(hit, COMPANY_FIELDS, language).unwrap_or_default();
    let activity = activity(hit, language);
    let website = website(hit, language);
    let country = first_text(hit, COUNTRY_FIELDS, language)
        .or_else(|| {
            query_country
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_owned)
        })
        .unwrap_or_default();
    let object_id = object_id(hit);

    ExhibitorRow {
        company,
        activity,
        website,
        country,
        object_id,
    }
}

/// Localized description text, used by the manufacturer post-filter.
#[must_use]
pub fn description(hit: &Value, language: &str) -> String {
    first_text(hit, DESCRIPTION_FIELDS, language).unwrap_or_default()
}

/// Selects text from a plain string or a language-keyed object:
/// requested language, then English, otherwise nothing.
pub(crate) fn localized_text(value: &Value, language: &str) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Object(map) => map
            .get(language)
            .and_then(Value::as_str)
            .and_then(non_empty)
            .or_else(|| {
                map.get(FALLBACK_LANGUAGE)
                    .and_then(Value::as_str)
                    .and_then(non_empty)
            }),
        _ => None,
    }
}

fn first_text(hit: &Value, fields: &[&str], language: &str) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| hit.get(*field))
        .find_map(|value| localized_text(value, language))
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn object_id(hit: &Value) -> String {
    OBJECT_ID_FIELDS
        .iter()
        .filter_map(|field| hit.get(*field))
        .find_map(|value| match value {
            Value::String(s) => non_empty(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Category names joined with `", "`, order-preserving and de-duplicated.
fn activity(hit: &Value, language: &str) -> String {
    let Some(categories) = hit.get("categories").and_then(Value::as_array) else {
        return String::new();
    };

    let mut seen = HashSet::new();
    categories
        .iter()
        .filter_map(|category| match category {
            Value::Object(obj) => obj.get("name").and_then(|n| localized_text(n, language)),
            other => localized_text(other, language),
        })
        .filter(|name| seen.insert(name.clone()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn website(hit: &Value, language: &str) -> String {
    if let Some(direct) = first_text(hit, WEBSITE_FIELDS, language) {
        return with_scheme(&direct);
    }
    let text = description(hit, language);
    extract_url_from_text(&text).unwrap_or_default()
}

/// Returns the first page-like URL embedded in free text.
///
/// Matches scheme-prefixed or `www.`-prefixed tokens, trims trailing
/// punctuation, skips asset links (images, documents), and prefixes
/// `www.` matches with `https://`.
#[must_use]
pub fn extract_url_from_text(text: &str) -> Option<String> {
    URL_RE
        .find_iter(text)
        .map(|m| trim_trailing_punctuation(m.as_str()))
        .filter(|candidate| candidate.len() > "www.".len() && !is_asset_url(candidate))
        .map(with_scheme)
        .next()
}

fn trim_trailing_punctuation(s: &str) -> &str {
    s.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '(', '\'', '"'])
}

fn is_asset_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    if ext.contains('/') {
        return false;
    }
    let ext = ext.to_ascii_lowercase();
    NON_PAGE_EXTENSIONS.contains(&ext.as_str())
}

fn with_scheme(url: &str) -> String {
    let url = url.trim();
    if url.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("www.")) {
        format!("https://{url}")
    } else {
        url.to_owned()
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
