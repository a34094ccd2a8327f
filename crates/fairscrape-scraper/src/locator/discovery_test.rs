use std::collections::BTreeMap;

use serde_json::json;

use super::*;

fn keywords() -> Vec<String> {
    vec!["stands".to_owned(), "exhibitor".to_owned()]
}

fn observed(url: &str, headers: &[(&str, &str)], body: Option<Value>) -> ObservedRequest {
    ObservedRequest {
        url: url.to_owned(),
        method: "POST".to_owned(),
        headers: headers
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<BTreeMap<_, _>>(),
        body: body.map(|b| b.to_string()),
    }
}

fn algolia_multi(index: &str, container: Option<i64>, api_key: Option<&str>) -> ObservedRequest {
    let params = match container {
        Some(id) => format!("query=a&filters=%28containerId%3A%20{id}%29&page=0"),
        None => "query=a&page=0".to_owned(),
    };
    let mut headers = vec![("x-algolia-application-id", "ABC123")];
    if let Some(key) = api_key {
        headers.push(("x-algolia-api-key", key));
    }
    observed(
        "https://abc123-dsn.algolia.net/1/indexes/*/queries?x-algolia-agent=Algolia",
        &headers,
        Some(json!({"requests": [{"indexName": index, "params": params}]})),
    )
}

// -----------------------------------------------------------------------
// parse_candidate
// -----------------------------------------------------------------------

#[test]
fn parses_algolia_multi_query_with_encoded_container_id() {
    let candidate = parse_candidate(&algolia_multi("stands_relevance", Some(2653), Some("k1"))).unwrap();
    assert_eq!(candidate.dialect, QueryDialect::Algolia);
    assert_eq!(candidate.style, QueryStyle::Multi);
    assert_eq!(candidate.app_id.as_deref(), Some("ABC123"));
    assert_eq!(candidate.api_key.as_deref(), Some("k1"));
    assert_eq!(candidate.index_name.as_deref(), Some("stands_relevance"));
    assert_eq!(candidate.container_id, Some(2653));
    assert!(candidate.is_usable());
}

#[test]
fn parses_single_query_index_from_path_and_credentials_from_query() {
    let request = observed(
        "https://xyz9-dsn.algolia.net/1/indexes/exhibitors_prod/query?x-algolia-api-key=k2",
        &[],
        Some(json!({"params": "filters=containerId%3D77"})),
    );
    let candidate = parse_candidate(&request).unwrap();
    assert_eq!(candidate.style, QueryStyle::Single);
    assert_eq!(candidate.index_name.as_deref(), Some("exhibitors_prod"));
    assert_eq!(candidate.api_key.as_deref(), Some("k2"));
    assert_eq!(candidate.app_id.as_deref(), Some("XYZ9"), "app id inferred from host");
    assert_eq!(candidate.container_id, Some(77));
}

#[test]
fn parses_widgets_request_without_credentials() {
    let request = observed(
        "https://my.easyfairs.com/widgets/api/stands/?language=es",
        &[],
        Some(json!([{
            "indexName": "stands_relevance",
            "params": {"filters": "(containerId: 2653)", "page": 0}
        }])),
    );
    let candidate = parse_candidate(&request).unwrap();
    assert_eq!(candidate.dialect, QueryDialect::Widgets);
    assert_eq!(candidate.container_id, Some(2653));
    assert!(candidate.is_usable(), "widgets candidates need no credentials");
}

#[test]
fn ignores_non_search_traffic() {
    let request = observed("https://fair.example.com/static/app.js", &[], None);
    assert!(parse_candidate(&request).is_none());
    let request = observed("https://abc-dsn.algolia.net/1/indexes/*/settings", &[], None);
    assert!(parse_candidate(&request).is_none());
}

#[test]
fn algolia_candidate_without_api_key_is_not_usable() {
    let candidate = parse_candidate(&algolia_multi("stands", Some(1), None)).unwrap();
    assert!(!candidate.is_usable());
}

// -----------------------------------------------------------------------
// score_candidate / select_backend
// -----------------------------------------------------------------------

#[test]
fn score_weights_keyword_container_and_key() {
    let full = parse_candidate(&algolia_multi("stands_relevance", Some(1), Some("k"))).unwrap();
    assert_eq!(score_candidate(&full, &keywords()), 7);

    let plain = parse_candidate(&algolia_multi("products", Some(1), Some("k"))).unwrap();
    assert_eq!(score_candidate(&plain, &keywords()), 3);
}

#[test]
fn select_prefers_keyword_index() {
    let traffic = vec![
        algolia_multi("products", Some(10), Some("k")),
        algolia_multi("exhibitors_prod", Some(11), Some("k")),
    ];
    let backend = select_backend(&traffic, &keywords()).unwrap();
    assert_eq!(backend.index_name, "exhibitors_prod");
    assert_eq!(backend.container_id, 11);
    assert_eq!(backend.origin, BackendOrigin::Discovered);
}

#[test]
fn select_keeps_first_on_tie() {
    let traffic = vec![
        algolia_multi("stands_a", Some(1), Some("k")),
        algolia_multi("stands_b", Some(2), Some("k")),
    ];
    let backend = select_backend(&traffic, &keywords()).unwrap();
    assert_eq!(backend.index_name, "stands_a");
}

#[test]
fn select_reports_no_matching_traffic() {
    let traffic = vec![observed("https://fair.example.com/", &[], None)];
    assert_eq!(
        select_backend(&traffic, &keywords()).unwrap_err(),
        DiscoveryFailure::NoMatchingTraffic { observed: 1 }
    );
}

#[test]
fn select_reports_missing_credentials() {
    let traffic = vec![
        algolia_multi("stands", Some(1), None),
        algolia_multi("stands", None, Some("k")),
    ];
    assert_eq!(
        select_backend(&traffic, &keywords()).unwrap_err(),
        DiscoveryFailure::MissingCredentials { candidates: 2 }
    );
}
