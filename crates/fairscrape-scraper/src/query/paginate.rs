//! Multi-page fetch loops for `SearchClient`.

use futures::{stream, StreamExt, TryStreamExt};

use crate::error::ExtractError;
use crate::types::{BackendConfig, CountryHits};

use super::{QueryOptions, SearchClient, HARD_PAGE_CAP};

impl SearchClient {
    /// Fetches every page of one query sequence, optionally facet-filtered by `country`.
    ///
    /// Pages are requested strictly in order. The loop stops when the upstream
    /// page count is reached, when a page comes back empty, or at the page cap.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Self::fetch_page`]; hits from earlier pages
    /// are discarded.
    pub async fn fetch_country(
        &self,
        backend: &BackendConfig,
        options: &QueryOptions,
        country: Option<&str>,
    ) -> Result<CountryHits, ExtractError> {
        let cap = page_cap(options.max_pages);
        let mut out = CountryHits {
            country: country.map(str::to_owned),
            ..CountryHits::default()
        };
        let mut page = 0u32;

        loop {
            if page >= cap {
                tracing::debug!(
                    container_id = backend.container_id,
                    country,
                    cap,
                    "page cap reached"
                );
                break;
            }

            if page > 0 && !self.settings.inter_page_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_page_delay).await;
            }

            let result = self.fetch_page(backend, options, page, country).await?;
            out.pages_fetched += 1;
            page += 1;

            if out.nb_hits.is_none() {
                out.nb_hits = result
                    .nb_hits
                    .or_else(|| country.and_then(|c| result.country_facet_count(c)));
            }

            if result.hits.is_empty() {
                break;
            }
            out.hits.extend(result.hits);

            if result.nb_pages.is_some_and(|total| page >= total) {
                break;
            }
        }

        tracing::debug!(
            container_id = backend.container_id,
            country,
            pages = out.pages_fetched,
            hits = out.hits.len(),
            nb_hits = out.nb_hits,
            "query sequence complete"
        );
        Ok(out)
    }

    /// Runs one facet-filtered sequence per country.
    ///
    /// Up to `country_concurrency` countries are in flight at once; results
    /// come back in the order of `countries`.
    ///
    /// # Errors
    ///
    /// Returns the first error from any country's sequence.
    pub async fn fetch_server_side(
        &self,
        backend: &BackendConfig,
        options: &QueryOptions,
        countries: &[String],
    ) -> Result<Vec<CountryHits>, ExtractError> {
        let concurrency = self.settings.country_concurrency.max(1);
        let sequences: Vec<_> = countries
            .iter()
            .map(|country| Box::pin(self.fetch_country(backend, options, Some(country.as_str()))))
            .collect();
        stream::iter(sequences)
            .buffered(concurrency)
            .try_collect()
            .await
    }

    /// Runs a single unfiltered sequence for local country filtering.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Self::fetch_country`].
    pub async fn fetch_client_side(
        &self,
        backend: &BackendConfig,
        options: &QueryOptions,
    ) -> Result<CountryHits, ExtractError> {
        self.fetch_country(backend, options, None).await
    }
}

fn page_cap(max_pages: u32) -> u32 {
    if max_pages == 0 {
        HARD_PAGE_CAP
    } else {
        max_pages.min(HARD_PAGE_CAP)
    }
}
