//! HTTP client for exhibitor search backends (Easyfairs widgets and Algolia).

mod paginate;
pub(crate) mod params;

use std::time::Duration;

use fairscrape_core::AppConfig;
use reqwest::Client;

use crate::error::{body_excerpt, ExtractError};
use crate::retry::{classify_extract_error, parse_retry_after, retry_with_backoff, RetryPolicy};
use crate::types::{BackendConfig, QueryDialect, SearchPage};

use params::{parse_response, request_body, request_url, PageParams};

/// Hard upper bound on pages per query sequence, applied even when the
/// caller asks for "unlimited" (`max_pages = 0`).
pub const HARD_PAGE_CAP: u32 = 500;

/// Seed term used when the configured one is blank. The backend returns no
/// ranked hits for an empty query.
pub const DEFAULT_QUERY_SEED: &str = "a";

const MIN_HITS_PER_PAGE: u32 = 10;
const MAX_HITS_PER_PAGE: u32 = 200;

/// Process-level settings for [`SearchClient`].
#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub widgets_endpoint: String,
    pub language: String,
    pub query_seed: String,
    pub hits_per_page: u32,
    pub max_pages: u32,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
    pub inter_page_delay: Duration,
    pub country_concurrency: usize,
}

impl QuerySettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            widgets_endpoint: config.widgets_endpoint.clone(),
            language: config.language.clone(),
            query_seed: config.query_seed.clone(),
            hits_per_page: config.hits_per_page,
            max_pages: config.max_pages,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            user_agent: config.user_agent.clone(),
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
                ..RetryPolicy::default()
            },
            inter_page_delay: Duration::from_millis(config.inter_page_delay_ms),
            country_concurrency: config.country_concurrency,
        }
    }
}

/// Per-extraction overrides of [`QuerySettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub language: String,
    /// Page cap per query sequence; `0` means "until exhausted" (bounded by
    /// [`HARD_PAGE_CAP`]).
    pub max_pages: u32,
    pub timeout: Duration,
}

/// Paginated search client.
///
/// Transient failures (403, 429, 5xx, timeouts, connection errors) are
/// retried per page with linear back-off; everything else surfaces as a
/// typed [`ExtractError`].
pub struct SearchClient {
    client: Client,
    settings: QuerySettings,
    query_seed: String,
    hits_per_page: u32,
}

impl SearchClient {
    /// Builds a client with the configured timeout, `User-Agent`, and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(settings: QuerySettings) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&settings.user_agent)
            .build()?;

        let query_seed = if settings.query_seed.trim().is_empty() {
            DEFAULT_QUERY_SEED.to_owned()
        } else {
            settings.query_seed.clone()
        };
        let hits_per_page = settings
            .hits_per_page
            .clamp(MIN_HITS_PER_PAGE, MAX_HITS_PER_PAGE);

        Ok(Self {
            client,
            settings,
            query_seed,
            hits_per_page,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    #[must_use]
    pub fn query_seed(&self) -> &str {
        &self.query_seed
    }

    /// Options derived from the process settings, before request overrides.
    #[must_use]
    pub fn default_options(&self) -> QueryOptions {
        QueryOptions {
            language: self.settings.language.clone(),
            max_pages: self.settings.max_pages,
            timeout: self.settings.request_timeout,
        }
    }

    /// Fetches one page, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::UpstreamQueryFailed`]: non-retriable status, or retries exhausted.
    /// - [`ExtractError::Http`]: transport failure after retries.
    /// - [`ExtractError::UpstreamMalformedResponse`]: body is not JSON (not retried).
    pub async fn fetch_page(
        &self,
        backend: &BackendConfig,
        options: &QueryOptions,
        page: u32,
        country: Option<&str>,
    ) -> Result<SearchPage, ExtractError> {
        let url = request_url(backend, &self.settings.widgets_endpoint, &options.language)?;
        let params = PageParams {
            container_id: backend.container_id,
            query: &self.query_seed,
            hits_per_page: self.hits_per_page,
            page,
            country,
        };
        let body = request_body(backend, &params);
        let context = format!(
            "{} page {page}{}",
            backend.index_name,
            country.map(|c| format!(" ({c})")).unwrap_or_default()
        );

        tracing::debug!(
            url = %url,
            container_id = backend.container_id,
            page,
            country,
            "querying search backend"
        );

        retry_with_backoff(&self.settings.retry, classify_extract_error, || {
            let url = url.clone();
            let body = &body;
            let context = &context;
            async move {
                let mut request = self
                    .client
                    .post(url)
                    .timeout(options.timeout)
                    .header(reqwest::header::ACCEPT, "*/*")
                    .json(body);

                if backend.dialect == QueryDialect::Algolia {
                    if let Some(app_id) = &backend.app_id {
                        request = request.header("x-algolia-application-id", app_id);
                    }
                    if let Some(api_key) = &backend.api_key {
                        request = request.header("x-algolia-api-key", api_key);
                    }
                }

                let response = request.send().await?;
                let status = response.status();
                let retry_after_secs = parse_retry_after(response.headers());
                let text = response.text().await?;

                if !status.is_success() {
                    return Err(ExtractError::UpstreamQueryFailed {
                        status: status.as_u16(),
                        body_excerpt: body_excerpt(&text),
                        retry_after_secs,
                    });
                }

                parse_response(&text, backend, context)
            }
        })
        .await
    }
}
