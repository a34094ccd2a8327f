//! Optional keyword post-filter that keeps likely manufacturers.
//!
//! Only meaningful for search-backend hits, which carry descriptions and
//! categories. Ambiguous hits are kept.

use fairscrape_core::ExhibitorRow;

const MANUFACTURER_HINTS: &[&str] = &[
    "fabricante",
    "fabricación",
    "fabricacion",
    "manufactur",
    "producer",
    "productor",
    "factory",
    "fábrica",
    "maker",
    "oem",
];

const DISTRIBUTOR_HINTS: &[&str] = &[
    "distribuidor",
    "distributor",
    "reseller",
    "revendedor",
    "importer",
    "importador",
    "dealer",
];

/// Returns `true` unless the text reads as distributor-only.
///
/// A hit is kept when it mentions a manufacturing hint, or when it mentions
/// no distribution hint at all.
#[must_use]
pub fn is_probable_manufacturer(row: &ExhibitorRow, description: &str) -> bool {
    let haystack = format!("{} {} {}", row.company, row.activity, description).to_lowercase();
    let words: Vec<&str> = haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let has_hint = |hints: &[&str]| {
        hints.iter().any(|hint| {
            if hint.len() <= 3 {
                words.iter().any(|w| w == hint)
            } else {
                haystack.contains(hint)
            }
        })
    };

    has_hint(MANUFACTURER_HINTS) || !has_hint(DISTRIBUTOR_HINTS)
}
