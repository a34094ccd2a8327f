//! Integration tests for the `Extractor` fallback chain.
//!
//! A `wiremock` server stands in for both the event website and its search
//! backend; a scripted `BrowserDriver` stands in for Chrome.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fairscrape_core::{EventCatalog, EventConfig, UnconfirmedPolicy};
use fairscrape_scraper::{
    BackendLocator, BrowserDriver, BrowserError, CountryStrategy, DiscoverySettings, ExtractError,
    ExtractRequest, Extractor, ExtractorOptions, HtmlFetcher, ObservedRequest, QuerySettings,
    RetryPolicy, SearchClient, StrategyKind, WaitPolicy,
};

const WIDGETS_PATH: &str = "/widgets/api/stands/";
const EVENT_PATH: &str = "/es/expositores";

/// Replays canned traffic and DOM text instead of driving a real browser.
#[derive(Default)]
struct ScriptedBrowser {
    observed: Vec<ObservedRequest>,
    dom: Vec<String>,
    dom_reads: AtomicUsize,
}

impl BrowserDriver for ScriptedBrowser {
    fn observe_requests(
        &self,
        _url: &str,
        _wait: &WaitPolicy,
    ) -> Result<Vec<ObservedRequest>, BrowserError> {
        Ok(self.observed.clone())
    }

    fn read_dom(
        &self,
        _url: &str,
        _selector: &str,
        _wait: &WaitPolicy,
    ) -> Result<Vec<String>, BrowserError> {
        self.dom_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.dom.clone())
    }
}

fn catalog_for(server: &MockServer) -> EventCatalog {
    let host = server.uri().trim_start_matches("http://").to_owned();
    vec![EventConfig {
        host,
        container_id: 2653,
        name: Some("Test Fair".to_owned()),
        language: None,
    }]
    .into_iter()
    .collect()
}

fn build_extractor(
    server: &MockServer,
    catalog: EventCatalog,
    browser: Option<Arc<dyn BrowserDriver>>,
) -> Extractor {
    let settings = QuerySettings {
        widgets_endpoint: format!("{}{WIDGETS_PATH}", server.uri()),
        language: "es".to_owned(),
        query_seed: "a".to_owned(),
        hits_per_page: 100,
        max_pages: 20,
        request_timeout: Duration::from_secs(5),
        user_agent: "fairscrape-test/0.1".to_owned(),
        retry: RetryPolicy::no_retries(),
        inter_page_delay: Duration::ZERO,
        country_concurrency: 1,
    };
    let search = SearchClient::new(settings).expect("failed to build SearchClient");
    let html = HtmlFetcher::new(Duration::from_secs(5), RetryPolicy::no_retries())
        .expect("failed to build HtmlFetcher");
    let locator = BackendLocator::new(Arc::new(catalog), DiscoverySettings::default(), browser.clone());
    let options = ExtractorOptions {
        default_countries: vec!["Spain".to_owned(), "Portugal".to_owned()],
        browser_enabled: true,
        discovery_timeout: Duration::from_secs(5),
    };
    Extractor::new(locator, search, html, browser, options)
}

fn event_url(server: &MockServer) -> String {
    format!("{}{EVENT_PATH}", server.uri())
}

fn results(hits: Value) -> Value {
    json!({"results": [{"hits": hits, "nbPages": 1}]})
}

async fn mount_search(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path(WIDGETS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_event_page(server: &MockServer, html: &str) {
    Mock::given(method("GET"))
        .and(path(EVENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(html.to_owned()))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Known backend
// ---------------------------------------------------------------------------

#[tokio::test]
async fn known_backend_wins_with_server_side_countries() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        results(json!([
            {"objectID": "1", "name": "Acme Robotics", "categories": [{"name": {"es": "Robótica"}}]},
            {"objectID": "2", "name": "Beta Pallets", "description": "Visit www.beta.example"}
        ])),
    )
    .await;

    let extractor = build_extractor(&server, catalog_for(&server), None);
    let extraction = extractor
        .extract(&ExtractRequest::new(event_url(&server)))
        .await
        .expect("known backend should produce rows");

    // Both country sequences return the same ids; the second copy is deduplicated.
    assert_eq!(extraction.rows.len(), 2);
    assert_eq!(extraction.rows[0].company, "Acme Robotics");
    assert_eq!(extraction.rows[0].country, "Spain");
    assert_eq!(extraction.rows[0].activity, "Robótica");
    assert_eq!(extraction.rows[1].website, "https://www.beta.example");

    let meta = &extraction.meta;
    assert_eq!(meta.source, StrategyKind::KnownBackend);
    assert!(meta.supported);
    assert_eq!(meta.container_id, Some(2653));
    assert_eq!(meta.country_strategy, Some(CountryStrategy::ServerSide));
    assert_eq!(meta.pages_fetched_by_country.len(), 2);
    assert!(meta.attempts.is_empty());
}

#[tokio::test]
async fn server_side_rows_outside_allow_list_are_dropped() {
    let server = MockServer::start().await;
    // The backend ignores the facet filter and echoes every country.
    mount_search(
        &server,
        results(json!([
            {"objectID": "1", "name": "Spanish Co", "country": "Spain"},
            {"objectID": "2", "name": "French Co", "country": "France"},
            {"objectID": "3", "name": "Quiet Co"}
        ])),
    )
    .await;

    let extractor = build_extractor(&server, catalog_for(&server), None);
    let mut request = ExtractRequest::new(event_url(&server));
    request.countries = vec!["Spain".to_owned()];

    let extraction = extractor.extract(&request).await.unwrap();
    let rows: Vec<(&str, &str)> = extraction
        .rows
        .iter()
        .map(|r| (r.company.as_str(), r.country.as_str()))
        .collect();
    assert_eq!(rows, vec![("Spanish Co", "Spain"), ("Quiet Co", "Spain")]);
    assert_eq!(extraction.meta.country_strategy, Some(CountryStrategy::ServerSide));
    assert_eq!(extraction.meta.dropped_by_country, 1);
}

#[tokio::test]
async fn client_side_override_filters_by_hit_country() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        results(json!([
            {"objectID": "1", "name": "Spanish Co", "country": "spain"},
            {"objectID": "2", "name": "French Co", "country": "France"},
            {"objectID": "3", "name": "Unknown Co"}
        ])),
    )
    .await;

    let extractor = build_extractor(&server, catalog_for(&server), None);
    let mut request = ExtractRequest::new(event_url(&server));
    request.country_strategy = Some(CountryStrategy::ClientSide);
    request.unconfirmed_policy = UnconfirmedPolicy::Drop;

    let extraction = extractor.extract(&request).await.unwrap();
    let companies: Vec<&str> = extraction.rows.iter().map(|r| r.company.as_str()).collect();
    assert_eq!(companies, vec!["Spanish Co"]);
    assert_eq!(extraction.meta.dropped_by_country, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn manufacturers_only_drops_distributor_hits() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        results(json!([
            {"objectID": "1", "name": "Forklift Maker SA", "description": "Fabricante de carretillas"},
            {"objectID": "2", "name": "Parts Trading", "description": "Distribuidor oficial"}
        ])),
    )
    .await;

    let extractor = build_extractor(&server, catalog_for(&server), None);
    let mut request = ExtractRequest::new(event_url(&server));
    request.countries = vec!["ES".to_owned()];
    request.manufacturers_only = true;

    let extraction = extractor.extract(&request).await.unwrap();
    assert_eq!(extraction.rows.len(), 1);
    assert_eq!(extraction.rows[0].company, "Forklift Maker SA");
    assert_eq!(extraction.meta.dropped_as_non_manufacturer, 1);
    assert_eq!(extraction.meta.countries, vec!["Spain"]);
}

// ---------------------------------------------------------------------------
// Fallback ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_known_backend_falls_through_in_order() {
    let server = MockServer::start().await;
    mount_search(&server, results(json!([]))).await;
    mount_event_page(
        &server,
        r#"<html><h1>Expositores</h1>
           <a href="/">Inicio</a>
           <a href="/e/1">Acme Robotics</a>
           <a href="/e/2">Beta Pallets</a></html>"#,
    )
    .await;

    let browser: Arc<dyn BrowserDriver> = Arc::new(ScriptedBrowser::default());
    let extractor = build_extractor(&server, catalog_for(&server), Some(browser));
    let extraction = extractor
        .extract(&ExtractRequest::new(event_url(&server)))
        .await
        .expect("static HTML should produce rows");

    assert_eq!(extraction.meta.source, StrategyKind::StaticHtml);
    assert_eq!(
        extraction.rows.iter().map(|r| r.company.as_str()).collect::<Vec<_>>(),
        vec!["Acme Robotics", "Beta Pallets"]
    );
    assert!(extraction.rows.iter().all(|r| r.country == "unconfirmed"));

    let attempts = &extraction.meta.attempts;
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].source, StrategyKind::KnownBackend);
    assert_eq!(attempts[0].rows, 0);
    assert!(attempts[0].supported);
    assert_eq!(attempts[1].source, StrategyKind::DiscoveredBackend);
    assert!(attempts[1]
        .failure
        .as_deref()
        .is_some_and(|f| f.starts_with("backend discovery failed")
            && f.contains("no search traffic")));
}

#[tokio::test]
async fn unknown_host_uses_discovered_backend() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        results(json!([{"objectID": "9", "name": "Gamma Lift", "country": "Portugal"}])),
    )
    .await;

    let observed = ObservedRequest {
        url: format!("{}{WIDGETS_PATH}?language=es", server.uri()),
        method: "POST".to_owned(),
        headers: BTreeMap::new(),
        body: Some(
            json!([{"indexName": "stands_relevance", "params": {"filters": "(containerId: 4242)"}}])
                .to_string(),
        ),
    };
    let browser: Arc<dyn BrowserDriver> = Arc::new(ScriptedBrowser {
        observed: vec![observed],
        ..ScriptedBrowser::default()
    });
    let extractor = build_extractor(&server, EventCatalog::default(), Some(browser));

    let extraction = extractor
        .extract(&ExtractRequest::new(event_url(&server)))
        .await
        .expect("discovered backend should produce rows");

    assert_eq!(extraction.meta.source, StrategyKind::DiscoveredBackend);
    assert_eq!(extraction.meta.container_id, Some(4242));
    assert_eq!(extraction.rows.len(), 1);
    assert_eq!(extraction.meta.attempts.len(), 1);
    assert_eq!(extraction.meta.attempts[0].source, StrategyKind::KnownBackend);
    assert!(extraction.meta.attempts[0].note.is_some());
}

#[tokio::test]
async fn headless_dom_is_last_resort() {
    let server = MockServer::start().await;
    mount_event_page(&server, "<html><h1>Welcome</h1></html>").await;

    let browser = Arc::new(ScriptedBrowser {
        dom: vec!["Contact".to_owned(), "Delta Conveyors".to_owned()],
        ..ScriptedBrowser::default()
    });
    let driver: Arc<dyn BrowserDriver> = browser.clone();
    let extractor = build_extractor(&server, EventCatalog::default(), Some(driver));

    let extraction = extractor
        .extract(&ExtractRequest::new(event_url(&server)))
        .await
        .expect("DOM strategy should produce rows");

    assert_eq!(extraction.meta.source, StrategyKind::HeadlessDom);
    assert_eq!(extraction.rows[0].company, "Delta Conveyors");
    assert_eq!(browser.dom_reads.load(Ordering::SeqCst), 1);
    let sources: Vec<StrategyKind> = extraction.meta.attempts.iter().map(|a| a.source).collect();
    assert_eq!(
        sources,
        vec![
            StrategyKind::KnownBackend,
            StrategyKind::DiscoveredBackend,
            StrategyKind::StaticHtml
        ]
    );
    assert_eq!(
        extraction.meta.attempts[2].note.as_deref(),
        Some("no exhibitor hint on page")
    );
}

#[tokio::test]
async fn all_strategies_empty_reports_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENT_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let extractor = build_extractor(&server, EventCatalog::default(), None);
    let err = extractor
        .extract(&ExtractRequest::new(event_url(&server)))
        .await
        .unwrap_err();

    let ExtractError::NoResultsAfterAllStrategies { attempts } = err else {
        panic!("expected NoResultsAfterAllStrategies, got: {err:?}");
    };
    let sources: Vec<StrategyKind> = attempts.iter().map(|a| a.source).collect();
    assert_eq!(
        sources,
        vec![
            StrategyKind::KnownBackend,
            StrategyKind::DiscoveredBackend,
            StrategyKind::StaticHtml,
            StrategyKind::HeadlessDom
        ]
    );
    assert!(attempts[2]
        .failure
        .as_deref()
        .is_some_and(|f| f.contains("404")));
}

#[tokio::test]
async fn invalid_url_is_rejected_before_any_strategy() {
    let server = MockServer::start().await;
    let extractor = build_extractor(&server, EventCatalog::default(), None);
    let err = extractor
        .extract(&ExtractRequest::new("ftp://fair.example.com/"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::InvalidEventUrl { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}
