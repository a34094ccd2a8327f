mod scrape;

use std::sync::Arc;

use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use fairscrape_core::UnconfirmedPolicy;
use fairscrape_scraper::{ExtractError, Extractor};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, RequestId, REQUEST_ID_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<Extractor>,
    /// Policy used when a request does not set `strict_country`.
    pub unconfirmed_policy: UnconfirmedPolicy,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "validation_error" | "no_results" => StatusCode::BAD_REQUEST,
            "unsupported_host" => StatusCode::UNPROCESSABLE_ENTITY,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Maps a pipeline failure onto the public error contract.
pub(super) fn map_extract_error(request_id: &str, error: ExtractError) -> ApiError {
    match error {
        ExtractError::InvalidEventUrl { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        ExtractError::NoResultsAfterAllStrategies { ref attempts } => {
            let details = serde_json::json!({ "attempts": attempts });
            ApiError::new(request_id, "no_results", error.to_string()).with_details(details)
        }
        ExtractError::UnsupportedHost { .. } | ExtractError::DiscoveryFailed(_) => {
            ApiError::new(request_id, "unsupported_host", error.to_string())
        }
        ExtractError::UpstreamQueryFailed { .. }
        | ExtractError::UpstreamMalformedResponse { .. }
        | ExtractError::Http(_) => {
            tracing::warn!(error = %error, "upstream failure surfaced to client");
            ApiError::new(request_id, "upstream_error", error.to_string())
        }
        ExtractError::Browser(_) => {
            tracing::error!(error = %error, "browser failure surfaced to client");
            ApiError::new(request_id, "internal_error", "browser automation failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, REQUEST_ID_HEADER])
        .expose_headers([header::CONTENT_DISPOSITION, REQUEST_ID_HEADER])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/scrape_json", post(scrape::scrape_json))
        .route("/api/v1/scrape", post(scrape::scrape_xlsx))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(Extension(req_id): Extension<RequestId>) -> impl IntoResponse {
    Json(ApiResponse {
        data: HealthData { status: "ok" },
        meta: ResponseMeta::new(req_id.0),
    })
}
