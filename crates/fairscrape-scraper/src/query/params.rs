//! Request encoding and response decoding for each search dialect.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use serde_json::{json, Value};

use crate::error::ExtractError;
use crate::types::{BackendConfig, BackendOrigin, QueryDialect, QueryStyle, SearchPage};

/// Characters left unescaped in Algolia params strings (RFC 3986 unreserved).
const PARAMS_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const FACETS: [&str; 2] = ["categories.name", "country"];
const MAX_VALUES_PER_FACET: u32 = 100;
const HIGHLIGHT_PRE_TAG: &str = "__ais-highlight__";
const HIGHLIGHT_POST_TAG: &str = "__/ais-highlight__";

/// Search parameters for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageParams<'a> {
    pub container_id: i64,
    pub query: &'a str,
    pub hits_per_page: u32,
    pub page: u32,
    pub country: Option<&'a str>,
}

impl PageParams<'_> {
    fn filters(&self) -> String {
        format!("(containerId: {})", self.container_id)
    }

    fn facet_filters(&self) -> Option<Value> {
        self.country.map(|c| json!([format!("country:{c}")]))
    }

    /// Params as a JSON object (widgets dialect).
    pub(crate) fn to_object(&self) -> Value {
        let mut params = json!({
            "facets": FACETS,
            "filters": self.filters(),
            "highlightPostTag": HIGHLIGHT_POST_TAG,
            "highlightPreTag": HIGHLIGHT_PRE_TAG,
            "hitsPerPage": self.hits_per_page,
            "maxValuesPerFacet": MAX_VALUES_PER_FACET,
            "page": self.page,
            "query": self.query,
        });
        if let (Some(facet_filters), Some(obj)) = (self.facet_filters(), params.as_object_mut()) {
            obj.insert("facetFilters".to_owned(), facet_filters);
        }
        params
    }

    /// Params as an url-encoded string (Algolia dialect).
    pub(crate) fn to_query_string(&self) -> String {
        let mut pairs = vec![
            ("facets", json!(FACETS).to_string()),
            ("filters", self.filters()),
            ("hitsPerPage", self.hits_per_page.to_string()),
            ("maxValuesPerFacet", MAX_VALUES_PER_FACET.to_string()),
            ("page", self.page.to_string()),
            ("query", self.query.to_owned()),
        ];
        if let Some(facet_filters) = self.facet_filters() {
            pairs.push(("facetFilters", facet_filters.to_string()));
        }
        pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", utf8_percent_encode(v, PARAMS_ENCODE_SET)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Builds the JSON request body for `backend`.
pub(crate) fn request_body(backend: &BackendConfig, params: &PageParams<'_>) -> Value {
    match (backend.dialect, backend.style) {
        (QueryDialect::Widgets, _) => json!([{
            "indexName": backend.index_name,
            "params": params.to_object(),
        }]),
        (QueryDialect::Algolia, QueryStyle::Multi) => json!({
            "requests": [{
                "indexName": backend.index_name,
                "params": params.to_query_string(),
            }]
        }),
        (QueryDialect::Algolia, QueryStyle::Single) => json!({
            "params": params.to_query_string(),
        }),
    }
}

/// Resolves the URL a page request is POSTed to.
///
/// Static backends use the configured widgets endpoint. Discovered backends
/// replay the observed URL. The widgets dialect always carries the
/// requested `language` query parameter.
pub(crate) fn request_url(
    backend: &BackendConfig,
    widgets_endpoint: &str,
    language: &str,
) -> Result<Url, ExtractError> {
    let raw = match (backend.origin, backend.endpoint.as_deref()) {
        (BackendOrigin::Discovered, Some(endpoint)) => endpoint,
        _ => widgets_endpoint,
    };
    let mut url = Url::parse(raw).map_err(|e| ExtractError::InvalidEventUrl {
        url: raw.to_owned(),
        reason: format!("search endpoint is not a valid URL: {e}"),
    })?;

    if backend.dialect == QueryDialect::Widgets {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "language")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair("language", language);
    }

    Ok(url)
}

/// Decodes a response body into the first (only) result page.
///
/// A structurally valid JSON body without a `results` entry decodes to an
/// empty page, which ends pagination.
pub(crate) fn parse_response(
    body: &str,
    backend: &BackendConfig,
    context: &str,
) -> Result<SearchPage, ExtractError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ExtractError::UpstreamMalformedResponse {
            context: context.to_owned(),
            source: e,
        })?;

    let page = match (backend.dialect, backend.style) {
        (QueryDialect::Algolia, QueryStyle::Single) => SearchPage::from_result(&value),
        _ => value
            .get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .map(SearchPage::from_result)
            .unwrap_or_default(),
    };
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(dialect: QueryDialect, style: QueryStyle, origin: BackendOrigin) -> BackendConfig {
        BackendConfig {
            container_id: 2653,
            endpoint: Some(
                "https://abc123-dsn.algolia.net/1/indexes/*/queries?x-algolia-agent=js".to_owned(),
            ),
            app_id: Some("ABC123".to_owned()),
            api_key: Some("key".to_owned()),
            index_name: "stands_relevance".to_owned(),
            dialect,
            style,
            origin,
            language: None,
        }
    }

    fn params(country: Option<&str>) -> PageParams<'_> {
        PageParams {
            container_id: 2653,
            query: "a",
            hits_per_page: 100,
            page: 2,
            country,
        }
    }

    #[test]
    fn widgets_body_is_array_with_params_object() {
        let b = backend(QueryDialect::Widgets, QueryStyle::Multi, BackendOrigin::Static);
        let body = request_body(&b, &params(Some("Spain")));
        let entry = &body[0];
        assert_eq!(entry["indexName"], "stands_relevance");
        assert_eq!(entry["params"]["filters"], "(containerId: 2653)");
        assert_eq!(entry["params"]["page"], 2);
        assert_eq!(entry["params"]["facetFilters"][0], "country:Spain");
        assert_eq!(entry["params"]["facets"][1], "country");
    }

    #[test]
    fn widgets_body_omits_facet_filter_without_country() {
        let b = backend(QueryDialect::Widgets, QueryStyle::Multi, BackendOrigin::Static);
        let body = request_body(&b, &params(None));
        assert!(body[0]["params"].get("facetFilters").is_none());
    }

    #[test]
    fn algolia_params_are_url_encoded() {
        let encoded = params(Some("Spain")).to_query_string();
        assert!(encoded.contains("filters=%28containerId%3A%202653%29"));
        assert!(encoded.contains("hitsPerPage=100"));
        assert!(encoded.contains("facetFilters=%5B%22country%3ASpain%22%5D"));
    }

    #[test]
    fn algolia_multi_and_single_envelopes_differ() {
        let multi = request_body(
            &backend(QueryDialect::Algolia, QueryStyle::Multi, BackendOrigin::Discovered),
            &params(None),
        );
        assert!(multi["requests"][0]["params"].is_string());

        let single = request_body(
            &backend(QueryDialect::Algolia, QueryStyle::Single, BackendOrigin::Discovered),
            &params(None),
        );
        assert!(single["params"].is_string());
        assert!(single.get("requests").is_none());
    }

    #[test]
    fn static_url_sets_language() {
        let b = backend(QueryDialect::Widgets, QueryStyle::Multi, BackendOrigin::Static);
        let url = request_url(&b, "https://my.easyfairs.com/widgets/api/stands/", "es").unwrap();
        assert_eq!(
            url.as_str(),
            "https://my.easyfairs.com/widgets/api/stands/?language=es"
        );
    }

    #[test]
    fn discovered_widgets_url_replaces_language() {
        let mut b = backend(QueryDialect::Widgets, QueryStyle::Multi, BackendOrigin::Discovered);
        b.endpoint = Some("https://my.easyfairs.com/widgets/api/stands/?language=fr&x=1".to_owned());
        let url = request_url(&b, "unused", "en").unwrap();
        assert_eq!(url.query(), Some("x=1&language=en"));
    }

    #[test]
    fn discovered_algolia_url_is_replayed_verbatim() {
        let b = backend(QueryDialect::Algolia, QueryStyle::Multi, BackendOrigin::Discovered);
        let url = request_url(&b, "unused", "es").unwrap();
        assert_eq!(url.query(), Some("x-algolia-agent=js"));
    }

    #[test]
    fn parse_response_multi_reads_first_result() {
        let b = backend(QueryDialect::Widgets, QueryStyle::Multi, BackendOrigin::Static);
        let page = parse_response(
            r#"{"results":[{"hits":[{"objectID":"1"}],"nbPages":4}]}"#,
            &b,
            "test",
        )
        .unwrap();
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.nb_pages, Some(4));
    }

    #[test]
    fn parse_response_single_reads_top_level() {
        let b = backend(QueryDialect::Algolia, QueryStyle::Single, BackendOrigin::Discovered);
        let page = parse_response(r#"{"hits":[{},{}],"nbHits":2}"#, &b, "test").unwrap();
        assert_eq!(page.hits.len(), 2);
        assert_eq!(page.nb_hits, Some(2));
    }

    #[test]
    fn parse_response_rejects_non_json() {
        let b = backend(QueryDialect::Widgets, QueryStyle::Multi, BackendOrigin::Static);
        let err = parse_response("<html>blocked</html>", &b, "page 0").unwrap_err();
        assert!(matches!(err, ExtractError::UpstreamMalformedResponse { .. }));
    }
}
