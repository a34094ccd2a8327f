//! Event backend locator.
//!
//! Resolves an event URL to a [`BackendConfig`] in priority order: the
//! static event catalog first, then runtime discovery from live browser
//! traffic. Nothing is cached; every call re-resolves.

pub mod discovery;

use std::sync::Arc;
use std::time::Duration;

use fairscrape_core::EventCatalog;
use reqwest::Url;
use serde::Serialize;

use crate::browser::{self, BrowserDriver, WaitPolicy};
use crate::error::{DiscoveryFailure, ExtractError};
use crate::types::{BackendConfig, BackendOrigin, QueryDialect, QueryStyle};

pub use discovery::{parse_candidate, score_candidate, select_backend, Candidate, WIDGETS_INDEX_NAME};

/// Tuning for runtime backend discovery.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub wait: WaitPolicy,
    /// Index-name fragments that mark an exhibitor index.
    pub index_keywords: Vec<String>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            index_keywords: vec!["stands".to_owned(), "exhibitor".to_owned()],
        }
    }
}

/// A resolved backend and the event host it was resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Located {
    pub host: String,
    pub backend: BackendConfig,
}

pub struct BackendLocator {
    catalog: Arc<EventCatalog>,
    settings: DiscoverySettings,
    browser: Option<Arc<dyn BrowserDriver>>,
}

impl BackendLocator {
    #[must_use]
    pub fn new(
        catalog: Arc<EventCatalog>,
        settings: DiscoverySettings,
        browser: Option<Arc<dyn BrowserDriver>>,
    ) -> Self {
        Self {
            catalog,
            settings,
            browser,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    /// Static catalog lookup on the exact, lowercased authority of `url`.
    ///
    /// Returns `None` for unknown hosts and for URLs that cannot be parsed.
    #[must_use]
    pub fn lookup_static(&self, url: &str) -> Option<BackendConfig> {
        let host = event_host(url).ok()?;
        let event = self.catalog.get(&host)?;
        tracing::debug!(host, container_id = event.container_id, "event found in catalog");
        Some(BackendConfig {
            container_id: event.container_id,
            endpoint: None,
            app_id: None,
            api_key: None,
            index_name: WIDGETS_INDEX_NAME.to_owned(),
            dialect: QueryDialect::Widgets,
            style: QueryStyle::Multi,
            origin: BackendOrigin::Static,
            language: event.language.clone(),
        })
    }

    /// Loads the page in a fresh browser and derives a backend from its
    /// search traffic, waiting at most the configured discovery timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryFailure`] describing why no backend was found.
    pub async fn discover(&self, url: &str) -> Result<BackendConfig, DiscoveryFailure> {
        self.discover_within(url, self.settings.wait.timeout).await
    }

    /// Like [`Self::discover`] with an explicit observation timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryFailure`] describing why no backend was found.
    pub async fn discover_within(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<BackendConfig, DiscoveryFailure> {
        let Some(driver) = self.browser.clone() else {
            return Err(DiscoveryFailure::BrowserUnavailable);
        };
        let wait = WaitPolicy {
            timeout,
            ..self.settings.wait
        };

        tracing::debug!(url, timeout_secs = timeout.as_secs(), "starting backend discovery");
        let observed = browser::observe_requests(driver, url.to_owned(), wait)
            .await
            .map_err(|e| DiscoveryFailure::PageLoadFailed {
                reason: e.to_string(),
            })?;

        let backend = select_backend(&observed, &self.settings.index_keywords)?;
        tracing::info!(
            url,
            index = %backend.index_name,
            container_id = backend.container_id,
            dialect = ?backend.dialect,
            "discovered search backend"
        );
        Ok(backend)
    }

    /// Static lookup, then discovery.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::InvalidEventUrl`] if `url` is not an absolute http(s) URL.
    /// - [`ExtractError::UnsupportedHost`] if the host is unknown and discovery failed.
    pub async fn locate(&self, url: &str) -> Result<Located, ExtractError> {
        let host = event_host(url)?;
        if let Some(backend) = self.lookup_static(url) {
            return Ok(Located { host, backend });
        }
        match self.discover(url).await {
            Ok(backend) => Ok(Located { host, backend }),
            Err(discovery) => Err(ExtractError::UnsupportedHost { host, discovery }),
        }
    }
}

/// Lowercased authority (`host` or `host:port`) of an absolute http(s) URL.
///
/// `www.` is kept: catalog matching is exact.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidEventUrl`] for unparsable, relative, or
/// non-http(s) URLs.
pub fn event_host(url: &str) -> Result<String, ExtractError> {
    let invalid = |reason: &str| ExtractError::InvalidEventUrl {
        url: url.to_owned(),
        reason: reason.to_owned(),
    };
    let parsed = Url::parse(url.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("URL has no host"))?
        .to_lowercase();
    Ok(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairscrape_core::EventConfig;

    fn catalog() -> Arc<EventCatalog> {
        Arc::new(
            vec![EventConfig {
                host: "logisticsautomationmadrid.com".to_owned(),
                container_id: 2653,
                name: None,
                language: Some("en".to_owned()),
            }]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn event_host_lowercases_and_keeps_www() {
        assert_eq!(
            event_host("https://WWW.Fair.Example.com/exhibitors?x=1").unwrap(),
            "www.fair.example.com"
        );
    }

    #[test]
    fn event_host_keeps_explicit_port() {
        assert_eq!(event_host("http://127.0.0.1:8080/").unwrap(), "127.0.0.1:8080");
        assert_eq!(event_host("https://fair.example.com:443/").unwrap(), "fair.example.com");
    }

    #[test]
    fn event_host_rejects_bad_urls() {
        for url in ["ftp://fair.example.com", "not a url", "/relative/path"] {
            assert!(
                matches!(event_host(url), Err(ExtractError::InvalidEventUrl { .. })),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn lookup_static_requires_exact_host() {
        let locator = BackendLocator::new(catalog(), DiscoverySettings::default(), None);
        let backend = locator
            .lookup_static("https://logisticsautomationmadrid.com/es/expositores")
            .unwrap();
        assert_eq!(backend.container_id, 2653);
        assert_eq!(backend.dialect, QueryDialect::Widgets);
        assert_eq!(backend.endpoint, None);
        assert_eq!(backend.language.as_deref(), Some("en"));

        assert!(locator
            .lookup_static("https://www.logisticsautomationmadrid.com/")
            .is_none());
    }

    #[tokio::test]
    async fn discovery_without_browser_is_unavailable() {
        let locator = BackendLocator::new(catalog(), DiscoverySettings::default(), None);
        assert_eq!(
            locator.discover("https://other.example.com/").await.unwrap_err(),
            DiscoveryFailure::BrowserUnavailable
        );
    }

    #[tokio::test]
    async fn locate_unknown_host_reports_unsupported() {
        let locator = BackendLocator::new(catalog(), DiscoverySettings::default(), None);
        let err = locator.locate("https://other.example.com/").await.unwrap_err();
        assert!(matches!(
            err,
            ExtractError::UnsupportedHost {
                ref host,
                discovery: DiscoveryFailure::BrowserUnavailable
            } if host == "other.example.com"
        ));
    }
}
