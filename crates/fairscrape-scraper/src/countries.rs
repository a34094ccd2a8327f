//! Country allow-list normalization, filtering, and row de-duplication.

use std::collections::HashSet;

use fairscrape_core::{ExhibitorRow, UnconfirmedPolicy, UNCONFIRMED_COUNTRY};

/// Code and spelling aliases mapped to the country names the upstream facets use.
const COUNTRY_ALIASES: &[(&[&str], &str)] = &[
    (&["ES", "ESP", "ESPAÑA", "ESPANA", "SPAIN"], "Spain"),
    (&["PT", "PRT", "PORTUGAL"], "Portugal"),
    (&["FR", "FRA", "FRANCE"], "France"),
    (&["DE", "DEU", "GERMANY"], "Germany"),
    (&["IT", "ITA", "ITALY"], "Italy"),
    (&["GB", "UK", "GBR", "UNITED KINGDOM"], "United Kingdom"),
];

/// Canonicalizes a requested country list.
///
/// Known codes map to full names, unknown tokens pass through trimmed,
/// duplicates are removed keeping first position. An empty (or all-blank)
/// request falls back to `defaults`.
#[must_use]
pub fn normalize_countries(requested: &[String], defaults: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let normalized: Vec<String> = requested
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(canonical_country)
        .filter(|c| seen.insert(c.to_lowercase()))
        .collect();

    if normalized.is_empty() {
        return normalize_defaults(defaults);
    }
    normalized
}

fn normalize_defaults(defaults: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    defaults
        .iter()
        .map(|c| canonical_country(c.trim()))
        .filter(|c| !c.is_empty() && seen.insert(c.to_lowercase()))
        .collect()
}

fn canonical_country(token: &str) -> String {
    let upper = token.to_uppercase();
    COUNTRY_ALIASES
        .iter()
        .find(|(aliases, _)| aliases.contains(&upper.as_str()))
        .map_or_else(|| token.to_owned(), |(_, name)| (*name).to_owned())
}

/// Outcome of applying a [`CountryFilter`] to a batch of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub rows: Vec<ExhibitorRow>,
    pub dropped: usize,
}

/// Country allow-list applied to every search-backend row.
#[derive(Debug, Clone)]
pub struct CountryFilter {
    allow: Vec<String>,
    policy: UnconfirmedPolicy,
}

impl CountryFilter {
    #[must_use]
    pub fn new(allow: &[String], policy: UnconfirmedPolicy) -> Self {
        Self {
            allow: allow.iter().map(|c| c.trim().to_lowercase()).collect(),
            policy,
        }
    }

    /// Keeps rows whose country matches the allow-list case-insensitively.
    ///
    /// Rows with no country are dropped under [`UnconfirmedPolicy::Drop`] and
    /// relabeled [`UNCONFIRMED_COUNTRY`] under [`UnconfirmedPolicy::Keep`].
    #[must_use]
    pub fn apply(&self, rows: Vec<ExhibitorRow>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        for mut row in rows {
            if self.admit(&mut row) {
                outcome.rows.push(row);
            } else {
                outcome.dropped += 1;
            }
        }
        outcome
    }

    /// Single-row form of [`Self::apply`]. May relabel `row.country`.
    pub fn admit(&self, row: &mut ExhibitorRow) -> bool {
        let country = row.country.trim().to_lowercase();
        if country.is_empty() || country == UNCONFIRMED_COUNTRY {
            match self.policy {
                UnconfirmedPolicy::Keep => {
                    row.country = UNCONFIRMED_COUNTRY.to_owned();
                    true
                }
                UnconfirmedPolicy::Drop => false,
            }
        } else {
            self.allow.iter().any(|allowed| *allowed == country)
        }
    }
}

/// Applies the unconfirmed-country policy to rows from strategies that
/// cannot observe a country at all (HTML and DOM scraping).
#[must_use]
pub fn label_unconfirmed(rows: Vec<ExhibitorRow>, policy: UnconfirmedPolicy) -> FilterOutcome {
    match policy {
        UnconfirmedPolicy::Keep => FilterOutcome {
            rows: rows
                .into_iter()
                .map(|mut row| {
                    if row.country.trim().is_empty() {
                        row.country = UNCONFIRMED_COUNTRY.to_owned();
                    }
                    row
                })
                .collect(),
            dropped: 0,
        },
        UnconfirmedPolicy::Drop => {
            let before = rows.len();
            let kept: Vec<_> = rows.into_iter().filter(ExhibitorRow::has_country).collect();
            FilterOutcome {
                dropped: before - kept.len(),
                rows: kept,
            }
        }
    }
}

/// Removes rows whose [`ExhibitorRow::dedup_key`] was already seen.
/// The first occurrence wins and keeps its position.
#[must_use]
pub fn dedup_rows(rows: Vec<ExhibitorRow>) -> Vec<ExhibitorRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.dedup_key()))
        .collect()
}
