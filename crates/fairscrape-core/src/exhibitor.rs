use serde::{Deserialize, Serialize};

/// Country label given to rows kept under [`UnconfirmedPolicy::Keep`] when
/// neither the upstream record nor the query could assert a country.
pub const UNCONFIRMED_COUNTRY: &str = "unconfirmed";

/// One exhibitor extracted from a trade-fair catalog, normalized across
/// every extraction strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExhibitorRow {
    /// Company display name. Empty when the upstream record has none; never invented.
    pub company: String,
    /// Category names joined with `", "`, localized to the requested language.
    pub activity: String,
    /// Company website, or empty when no explicit URL evidence exists.
    pub website: String,
    pub country: String,
    /// Upstream stable identifier (`objectID`), empty when the source has none.
    pub object_id: String,
}

/// Identity used to collapse duplicate rows within one extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    ObjectId(String),
    CompanyCountry(String, String),
    Company(String),
}

impl ExhibitorRow {
    /// Returns the deduplication key for this row.
    ///
    /// Prefers the upstream object id, then `(company, country)`, then the
    /// company name alone.
    #[must_use]
    pub fn dedup_key(&self) -> DedupKey {
        let object_id = self.object_id.trim();
        if !object_id.is_empty() {
            return DedupKey::ObjectId(object_id.to_string());
        }
        let company = self.company.trim().to_string();
        let country = self.country.trim();
        if country.is_empty() {
            DedupKey::Company(company)
        } else {
            DedupKey::CompanyCountry(company, country.to_string())
        }
    }

    /// Returns `true` if the row carries an asserted country value.
    #[must_use]
    pub fn has_country(&self) -> bool {
        let country = self.country.trim();
        !country.is_empty() && country != UNCONFIRMED_COUNTRY
    }
}

/// What to do with rows whose country cannot be confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnconfirmedPolicy {
    /// Keep the row and label its country [`UNCONFIRMED_COUNTRY`].
    #[default]
    Keep,
    /// Drop the row (strict).
    Drop,
}

impl std::fmt::Display for UnconfirmedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnconfirmedPolicy::Keep => write!(f, "keep"),
            UnconfirmedPolicy::Drop => write!(f, "drop"),
        }
    }
}
