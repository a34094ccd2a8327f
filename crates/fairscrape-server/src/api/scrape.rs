use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use fairscrape_core::{ExhibitorRow, UnconfirmedPolicy};
use fairscrape_export::{build_workbook, SheetMeta};
use fairscrape_scraper::{CountryStrategy, ExtractRequest, Extraction, ExtractionMeta};
use serde::{Deserialize, Serialize};

use super::{map_extract_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLSX_DISPOSITION: &str = "attachment; filename=\"exhibitors.xlsx\"";

const DEFAULT_MAX_PAGES: u32 = 20;
const DEFAULT_TIMEOUT_MS: u64 = 25_000;
const MIN_TIMEOUT_SECS: u64 = 5;
const MAX_PAGES_LIMIT: u32 = 500;

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Deserialize)]
pub(super) struct ScrapeRequest {
    url: String,
    #[serde(default)]
    countries: Vec<String>,
    #[serde(default = "default_max_pages")]
    max_pages: u32,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default)]
    manufacturers_only: bool,
    /// `None` falls back to the configured unconfirmed-country policy.
    #[serde(default)]
    strict_country: Option<bool>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    country_strategy: Option<CountryStrategy>,
}

#[derive(Debug, Serialize)]
pub(super) struct ScrapeData {
    url: String,
    total: usize,
    results: Vec<ExhibitorRow>,
    extraction: ExtractionMeta,
}

impl ScrapeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("url must not be empty".to_string());
        }
        if self.max_pages > MAX_PAGES_LIMIT {
            return Err(format!("max_pages must be at most {MAX_PAGES_LIMIT}"));
        }
        if self.countries.iter().any(|c| c.trim().is_empty()) {
            return Err("countries must not contain blank entries".to_string());
        }
        if self.language.as_deref().is_some_and(|l| l.trim().is_empty()) {
            return Err("language must not be blank when provided".to_string());
        }
        Ok(())
    }

    fn into_extract_request(self, default_policy: UnconfirmedPolicy) -> ExtractRequest {
        let unconfirmed_policy = match self.strict_country {
            Some(true) => UnconfirmedPolicy::Drop,
            Some(false) => UnconfirmedPolicy::Keep,
            None => default_policy,
        };
        ExtractRequest {
            event_url: self.url.trim().to_string(),
            countries: self.countries,
            max_pages: Some(self.max_pages),
            timeout: Some(request_timeout(self.timeout_ms)),
            manufacturers_only: self.manufacturers_only,
            unconfirmed_policy,
            country_strategy: self.country_strategy,
            language: self.language.map(|l| l.trim().to_string()),
        }
    }
}

/// Whole seconds from a millisecond budget, floored at five seconds.
fn request_timeout(timeout_ms: u64) -> Duration {
    Duration::from_secs((timeout_ms / 1000).max(MIN_TIMEOUT_SECS))
}

async fn run_extraction(
    state: &AppState,
    req_id: &str,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<(String, Extraction), ApiError> {
    let Json(body) =
        payload.map_err(|e| ApiError::new(req_id, "validation_error", e.body_text()))?;
    body.validate()
        .map_err(|message| ApiError::new(req_id, "validation_error", message))?;

    let url = body.url.trim().to_string();
    let request = body.into_extract_request(state.unconfirmed_policy);

    tracing::info!(
        request_id = %req_id,
        event_url = %url,
        countries = ?request.countries,
        "scrape requested"
    );

    let extraction = state
        .extractor
        .extract(&request)
        .await
        .map_err(|e| map_extract_error(req_id, e))?;

    tracing::info!(
        request_id = %req_id,
        source = %extraction.meta.source,
        rows = extraction.rows.len(),
        "scrape finished"
    );

    Ok((url, extraction))
}

pub(super) async fn scrape_json(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (url, extraction) = run_extraction(&state, &req_id.0, payload).await?;

    Ok(Json(ApiResponse {
        data: ScrapeData {
            url,
            total: extraction.rows.len(),
            results: extraction.rows,
            extraction: extraction.meta,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn scrape_xlsx(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let (url, extraction) = run_extraction(&state, &req_id.0, payload).await?;

    let sheet_meta = SheetMeta {
        url,
        driver: extraction.meta.source.to_string(),
        supported: extraction.meta.supported,
    };
    let bytes = build_workbook(&extraction.rows, &sheet_meta).map_err(|e| {
        tracing::error!(request_id = %req_id.0, error = %e, "workbook rendering failed");
        ApiError::new(&req_id.0, "internal_error", "failed to render spreadsheet")
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE)),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static(XLSX_DISPOSITION),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
#[path = "scrape_test.rs"]
mod tests;
