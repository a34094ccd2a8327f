//! Fallback chain: known backend, discovered backend, static HTML, headless DOM.
//!
//! Strategies run strictly in that order. The first one that yields at least
//! one row wins; every earlier attempt is carried in `meta.attempts`. When all
//! of them come up empty the caller gets
//! [`ExtractError::NoResultsAfterAllStrategies`] with the full attempt list.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use fairscrape_core::{AppConfig, EventCatalog, ExhibitorRow, UnconfirmedPolicy};
use serde::Serialize;

use crate::browser::{self, BrowserDriver, ChromeDriver, ChromeOptions, WaitPolicy};
use crate::countries::{dedup_rows, label_unconfirmed, normalize_countries, CountryFilter};
use crate::error::ExtractError;
use crate::html::{anchor_names, dom_names, has_exhibitor_hint, rows_from_names, HtmlFetcher};
use crate::locator::{event_host, BackendLocator, DiscoverySettings};
use crate::manufacturer::is_probable_manufacturer;
use crate::meta::{CountryStrategy, ExtractionMeta, StrategyKind, ALL_COUNTRIES_KEY};
use crate::normalize::{description, normalize_hit};
use crate::query::{QueryOptions, QuerySettings, SearchClient};
use crate::types::{BackendConfig, CountryHits, QueryDialect};

/// Selector read by the headless DOM strategy.
const DOM_SELECTOR: &str = "a";

/// Orchestrator-level settings that do not belong to any one collaborator.
#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    /// Allow-list used when a request names no countries.
    pub default_countries: Vec<String>,
    /// Gates both browser-backed strategies.
    pub browser_enabled: bool,
    pub discovery_timeout: Duration,
}

impl ExtractorOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_countries: config.default_countries.clone(),
            browser_enabled: config.browser_enabled,
            discovery_timeout: Duration::from_secs(config.discovery_timeout_secs),
        }
    }
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            default_countries: vec!["Spain".to_owned(), "Portugal".to_owned()],
            browser_enabled: true,
            discovery_timeout: WaitPolicy::default().timeout,
        }
    }
}

/// One extraction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub event_url: String,
    /// Requested countries, in any supported spelling. Empty means the defaults.
    pub countries: Vec<String>,
    /// Page cap per query sequence. `None` uses the configured cap.
    pub max_pages: Option<u32>,
    /// Per-request network timeout. `None` uses the configured timeouts.
    pub timeout: Option<Duration>,
    pub manufacturers_only: bool,
    pub unconfirmed_policy: UnconfirmedPolicy,
    pub country_strategy: Option<CountryStrategy>,
    pub language: Option<String>,
}

impl ExtractRequest {
    #[must_use]
    pub fn new(event_url: impl Into<String>) -> Self {
        Self {
            event_url: event_url.into(),
            countries: Vec::new(),
            max_pages: None,
            timeout: None,
            manufacturers_only: false,
            unconfirmed_policy: UnconfirmedPolicy::default(),
            country_strategy: None,
            language: None,
        }
    }
}

/// Rows plus the metadata of the strategy that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub rows: Vec<ExhibitorRow>,
    pub meta: ExtractionMeta,
}

impl Extraction {
    fn empty(meta: ExtractionMeta) -> Self {
        Self {
            rows: Vec::new(),
            meta,
        }
    }
}

pub struct Extractor {
    locator: BackendLocator,
    search: SearchClient,
    html: HtmlFetcher,
    browser: Option<Arc<dyn BrowserDriver>>,
    options: ExtractorOptions,
}

impl Extractor {
    #[must_use]
    pub fn new(
        locator: BackendLocator,
        search: SearchClient,
        html: HtmlFetcher,
        browser: Option<Arc<dyn BrowserDriver>>,
        options: ExtractorOptions,
    ) -> Self {
        Self {
            locator,
            search,
            html,
            browser,
            options,
        }
    }

    /// Wires every collaborator from process configuration. A Chrome driver
    /// is attached only when the browser is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &AppConfig, catalog: Arc<EventCatalog>) -> Result<Self, ExtractError> {
        let settings = QuerySettings::from_config(config);
        let html = HtmlFetcher::new(settings.request_timeout, settings.retry)?;
        let search = SearchClient::new(settings)?;

        let browser: Option<Arc<dyn BrowserDriver>> = if config.browser_enabled {
            Some(Arc::new(ChromeDriver::new(ChromeOptions::from_env())))
        } else {
            None
        };
        let options = ExtractorOptions::from_config(config);
        let discovery = DiscoverySettings {
            wait: WaitPolicy::with_timeout(options.discovery_timeout),
            ..DiscoverySettings::default()
        };
        let locator = BackendLocator::new(catalog, discovery, browser.clone());

        Ok(Self::new(locator, search, html, browser, options))
    }

    #[must_use]
    pub fn locator(&self) -> &BackendLocator {
        &self.locator
    }

    /// Runs the fallback chain for one event URL.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::InvalidEventUrl`] if the URL is not absolute http(s).
    /// - [`ExtractError::NoResultsAfterAllStrategies`] if no strategy produced rows.
    pub async fn extract(&self, request: &ExtractRequest) -> Result<Extraction, ExtractError> {
        let host = event_host(&request.event_url)?;
        let countries = normalize_countries(&request.countries, &self.options.default_countries);
        let mut attempts: Vec<ExtractionMeta> = Vec::new();

        tracing::info!(
            event_url = %request.event_url,
            host,
            countries = ?countries,
            "starting extraction"
        );

        let known = match self.locator.lookup_static(&request.event_url) {
            Some(backend) => {
                let outcome = self
                    .run_backend(StrategyKind::KnownBackend, &host, &backend, request, &countries)
                    .await;
                settle(StrategyKind::KnownBackend, &host, outcome)
            }
            None => Extraction::empty(ExtractionMeta::skipped(
                StrategyKind::KnownBackend,
                &host,
                "host not in event catalog",
            )),
        };
        if let Some(done) = finish(known, &mut attempts) {
            return Ok(done);
        }

        let discovered = if self.options.browser_enabled && self.locator.has_browser() {
            let timeout = request.timeout.unwrap_or(self.options.discovery_timeout);
            let outcome = match self.locator.discover_within(&request.event_url, timeout).await {
                Ok(backend) => {
                    self.run_backend(
                        StrategyKind::DiscoveredBackend,
                        &host,
                        &backend,
                        request,
                        &countries,
                    )
                    .await
                }
                Err(failure) => Err(ExtractError::DiscoveryFailed(failure)),
            };
            settle(StrategyKind::DiscoveredBackend, &host, outcome)
        } else {
            Extraction::empty(ExtractionMeta::skipped(
                StrategyKind::DiscoveredBackend,
                &host,
                "no browser available",
            ))
        };
        if let Some(done) = finish(discovered, &mut attempts) {
            return Ok(done);
        }

        let outcome = self.run_static_html(&host, request).await;
        if let Some(done) = finish(settle(StrategyKind::StaticHtml, &host, outcome), &mut attempts) {
            return Ok(done);
        }

        let dom = match self.browser.clone().filter(|_| self.options.browser_enabled) {
            Some(driver) => {
                let outcome = self.run_headless_dom(driver, &host, request).await;
                settle(StrategyKind::HeadlessDom, &host, outcome)
            }
            None => Extraction::empty(ExtractionMeta::skipped(
                StrategyKind::HeadlessDom,
                &host,
                "no browser available",
            )),
        };
        if let Some(done) = finish(dom, &mut attempts) {
            return Ok(done);
        }

        tracing::warn!(host, attempts = attempts.len(), "no strategy produced rows");
        Err(ExtractError::NoResultsAfterAllStrategies { attempts })
    }

    fn query_options(&self, request: &ExtractRequest, backend: &BackendConfig) -> QueryOptions {
        let defaults = self.search.default_options();
        QueryOptions {
            language: request
                .language
                .clone()
                .or_else(|| backend.language.clone())
                .unwrap_or(defaults.language),
            max_pages: request.max_pages.unwrap_or(defaults.max_pages),
            timeout: request.timeout.unwrap_or(defaults.timeout),
        }
    }

    /// Queries a search backend and turns its hits into filtered, deduplicated rows.
    async fn run_backend(
        &self,
        source: StrategyKind,
        host: &str,
        backend: &BackendConfig,
        request: &ExtractRequest,
        countries: &[String],
    ) -> Result<Extraction, ExtractError> {
        let options = self.query_options(request, backend);
        let strategy = request
            .country_strategy
            .unwrap_or_else(|| default_country_strategy(backend));

        let mut meta = ExtractionMeta {
            container_id: Some(backend.container_id),
            index_name: Some(backend.index_name.clone()),
            language: options.language.clone(),
            query_seed: self.search.query_seed().to_owned(),
            countries: countries.to_vec(),
            country_strategy: Some(strategy),
            ..ExtractionMeta::new(source, host)
        };

        let sequences = match strategy {
            CountryStrategy::ServerSide => {
                self.search
                    .fetch_server_side(backend, &options, countries)
                    .await?
            }
            CountryStrategy::ClientSide => {
                vec![self.search.fetch_client_side(backend, &options).await?]
            }
        };

        let filter = CountryFilter::new(countries, request.unconfirmed_policy);
        let mut seen = HashSet::new();
        let mut rows = Vec::new();

        for sequence in &sequences {
            record_sequence(&mut meta, sequence);
            for hit in &sequence.hits {
                let mut row = normalize_hit(hit, &options.language, sequence.country.as_deref());
                if !filter.admit(&mut row) {
                    meta.dropped_by_country += 1;
                    continue;
                }
                if !seen.insert(row.dedup_key()) {
                    continue;
                }
                if request.manufacturers_only
                    && !is_probable_manufacturer(&row, &description(hit, &options.language))
                {
                    meta.dropped_as_non_manufacturer += 1;
                    continue;
                }
                rows.push(row);
            }
        }

        meta.supported = true;
        meta.deduplicated = true;
        meta.rows = rows.len();
        if rows.is_empty() {
            meta.note = Some("backend returned no matching exhibitors".to_owned());
        }
        tracing::info!(
            host,
            source = %source,
            strategy = %strategy,
            rows = rows.len(),
            dropped_by_country = meta.dropped_by_country,
            dropped_as_non_manufacturer = meta.dropped_as_non_manufacturer,
            "backend strategy finished"
        );
        Ok(Extraction { rows, meta })
    }

    async fn run_static_html(
        &self,
        host: &str,
        request: &ExtractRequest,
    ) -> Result<Extraction, ExtractError> {
        let timeout = request
            .timeout
            .unwrap_or(self.search.settings().request_timeout);
        let body = self.html.fetch(&request.event_url, timeout).await?;

        let mut meta = ExtractionMeta::new(StrategyKind::StaticHtml, host);
        if !has_exhibitor_hint(&body) {
            meta.note = Some("no exhibitor hint on page".to_owned());
            return Ok(Extraction::empty(meta));
        }
        meta.supported = true;
        Ok(name_rows(meta, anchor_names(&body), request))
    }

    async fn run_headless_dom(
        &self,
        driver: Arc<dyn BrowserDriver>,
        host: &str,
        request: &ExtractRequest,
    ) -> Result<Extraction, ExtractError> {
        let timeout = request.timeout.unwrap_or(self.options.discovery_timeout);
        let texts = browser::read_dom(
            driver,
            request.event_url.clone(),
            DOM_SELECTOR.to_owned(),
            WaitPolicy::with_timeout(timeout),
        )
        .await?;

        let mut meta = ExtractionMeta::new(StrategyKind::HeadlessDom, host);
        meta.supported = true;
        Ok(name_rows(meta, dom_names(&texts), request))
    }
}

/// Widgets backends support the country facet; discovered Algolia indexes
/// may not expose it, so their hits are filtered locally.
#[must_use]
pub fn default_country_strategy(backend: &BackendConfig) -> CountryStrategy {
    match backend.dialect {
        QueryDialect::Widgets => CountryStrategy::ServerSide,
        QueryDialect::Algolia => CountryStrategy::ClientSide,
    }
}

fn record_sequence(meta: &mut ExtractionMeta, sequence: &CountryHits) {
    let key = sequence
        .country
        .clone()
        .unwrap_or_else(|| ALL_COUNTRIES_KEY.to_owned());
    let reported = sequence
        .nb_hits
        .unwrap_or_else(|| u64::try_from(sequence.hits.len()).unwrap_or(u64::MAX));
    meta.hits_reported_by_country.insert(key.clone(), reported);
    meta.pages_fetched_by_country
        .insert(key, sequence.pages_fetched);
}

/// Name-only rows from HTML or DOM scraping.
fn name_rows(mut meta: ExtractionMeta, names: Vec<String>, request: &ExtractRequest) -> Extraction {
    let outcome = label_unconfirmed(rows_from_names(names), request.unconfirmed_policy);
    let rows = dedup_rows(outcome.rows);

    meta.deduplicated = true;
    meta.dropped_by_country = outcome.dropped;
    meta.rows = rows.len();
    if request.manufacturers_only {
        meta.note = Some("manufacturers_only ignored: page text carries no descriptions".to_owned());
    }
    tracing::info!(
        host = meta.host.as_deref(),
        source = %meta.source,
        rows = rows.len(),
        "heuristic strategy finished"
    );
    Extraction { rows, meta }
}

/// Converts a strategy error into a failed attempt so the chain can continue.
fn settle(source: StrategyKind, host: &str, outcome: Result<Extraction, ExtractError>) -> Extraction {
    match outcome {
        Ok(extraction) => extraction,
        Err(err) => {
            tracing::warn!(host, source = %source, error = %err, "strategy failed");
            Extraction::empty(ExtractionMeta::failed(source, host, err))
        }
    }
}

/// Returns the winning extraction, or records the attempt and returns `None`.
fn finish(mut extraction: Extraction, attempts: &mut Vec<ExtractionMeta>) -> Option<Extraction> {
    if extraction.rows.is_empty() {
        attempts.push(extraction.meta);
        return None;
    }
    extraction.meta.attempts = std::mem::take(attempts);
    Some(extraction)
}
