use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire shape spoken by a search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryDialect {
    /// Easyfairs `widgets/api/stands` proxy: JSON array body, params as an object.
    Widgets,
    /// Native Algolia REST: params as a url-encoded string.
    Algolia,
}

/// Request/response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStyle {
    /// Batched queries; response wraps each result in `results[]`.
    Multi,
    /// `/1/indexes/<index>/query`; response fields are top-level.
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendOrigin {
    Static,
    Discovered,
}

/// Connection parameters for one event's exhibitor search backend.
///
/// Resolved once per extraction request and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendConfig {
    pub container_id: i64,
    /// Observed request URL. `None` for statically mapped events, which use
    /// the configured widgets endpoint.
    pub endpoint: Option<String>,
    pub app_id: Option<String>,
    pub api_key: Option<String>,
    pub index_name: String,
    pub dialect: QueryDialect,
    pub style: QueryStyle,
    pub origin: BackendOrigin,
    /// Catalog language preferred by the event, if configured.
    pub language: Option<String>,
}

/// One parsed page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub hits: Vec<Value>,
    pub nb_hits: Option<u64>,
    pub nb_pages: Option<u32>,
    pub facets: Map<String, Value>,
}

impl SearchPage {
    /// Parses a single result object (`{hits, nbHits, nbPages, facets}`).
    #[must_use]
    pub fn from_result(result: &Value) -> Self {
        let hits = result
            .get("hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let nb_hits = result.get("nbHits").and_then(Value::as_u64);
        let nb_pages = result
            .get("nbPages")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok());
        let facets = result
            .get("facets")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Self {
            hits,
            nb_hits,
            nb_pages,
            facets,
        }
    }

    /// Hit count the `country` facet reports for `country`, if any.
    #[must_use]
    pub fn country_facet_count(&self, country: &str) -> Option<u64> {
        self.facets
            .get("country")
            .and_then(Value::as_object)
            .and_then(|counts| counts.get(country))
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
    }
}

/// Every hit retrieved for one query sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryHits {
    /// Country facet applied server-side, or `None` for an unfiltered sequence.
    pub country: Option<String>,
    pub hits: Vec<Value>,
    pub nb_hits: Option<u64>,
    pub pages_fetched: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_result_reads_counts_and_hits() {
        let page = SearchPage::from_result(&json!({
            "hits": [{"objectID": "1"}],
            "nbHits": 120,
            "nbPages": 2,
            "facets": {"country": {"Spain": 80}}
        }));
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.nb_hits, Some(120));
        assert_eq!(page.nb_pages, Some(2));
        assert_eq!(page.country_facet_count("Spain"), Some(80));
        assert_eq!(page.country_facet_count("France"), None);
    }

    #[test]
    fn from_result_tolerates_missing_fields() {
        let page = SearchPage::from_result(&json!({}));
        assert!(page.hits.is_empty());
        assert_eq!(page.nb_pages, None);
    }
}
