//! Axum HTTP façade.
//!
//! [`create_router()`] builds the complete application:
//!
//! | Route | Handler | Response |
//! |-------|---------|----------|
//! | `GET /` | banner | `200 text/plain` |
//! | `GET /health` | liveness | `200 {"ok":true,"ts":"..."}` |
//! | `GET /api/stats` | monitoring | `200` [`ServiceStats`](crate::ServiceStats) |
//! | `POST /api/gerar-pdf` | render | `200 application/pdf` or JSON error |
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gerar_pdf_api::integrations::axum::{create_router, shutdown_signal};
//! use gerar_pdf_api::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::default();
//!     let service = Arc::new(PdfService::from_config(&config)?);
//!
//!     let app = create_router(Arc::clone(&service), &config);
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!
//!     axum::serve(listener, app)
//!         .with_graceful_shutdown(shutdown_signal())
//!         .await?;
//!
//!     service.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Error Bodies
//!
//! Every failure is `{"error": CODE, "detail": message}` with the status from
//! [`PdfServiceError::status_code()`]. Body extraction failures are mapped
//! here: an oversized body is `413 PAYLOAD_TOO_LARGE`, anything else that
//! is not a JSON object with a string `html` is `400 INVALID_INPUT`.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::ServiceConfig;
use crate::service::{
    ErrorResponse, HealthResponse, PdfRequest, PdfResponse, PdfService, PdfServiceError,
    wildcard_match,
};
use crate::stats::ServiceStats;

/// Plain-text banner served at `/`.
pub const BANNER: &str = "gerar-pdf-api OK";

/// Type alias for the Axum `State` extractor with the shared service.
///
/// ```rust,ignore
/// async fn handler(State(service): PdfServiceState) -> impl IntoResponse {
///     Json(service.stats())
/// }
/// ```
pub type PdfServiceState = State<Arc<PdfService>>;

/// Build the application router.
///
/// The body limit and CORS policy come from `config`; the service is shared
/// with every handler.
pub fn create_router(service: Arc<PdfService>, config: &ServiceConfig) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/gerar-pdf", post(gerar_pdf))
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(cors_layer(&config.cors_origins))
        .with_state(service)
}

/// CORS policy for the façade.
///
/// - `*` (or an empty list) allows any origin.
/// - Otherwise each entry is a case-insensitive wildcard pattern matched
///   against the request `Origin`, e.g. `https://*.netlify.app`.
///
/// Methods `GET, POST, OPTIONS`, request header `Content-Type`, and
/// `Content-Disposition` exposed so browsers can read the filename.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([CONTENT_DISPOSITION]);

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        log::debug!("CORS: any origin allowed");
        return layer.allow_origin(Any);
    }

    let patterns: Vec<String> = origins
        .iter()
        .map(|origin| origin.trim_end_matches('/').to_string())
        .collect();

    for literal in patterns.iter().filter(|p| !p.contains('*')) {
        if let Err(e) = url::Url::parse(literal) {
            log::warn!(
                "⚠️ CORS origin '{}' is not a valid URL ({}); it will never match",
                literal,
                e
            );
        }
    }
    log::debug!("CORS: allowed origin patterns {:?}", patterns);

    layer.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _request: &Parts| {
            origin
                .to_str()
                .map(|origin| patterns.iter().any(|pattern| wildcard_match(pattern, origin)))
                .unwrap_or(false)
        },
    ))
}

/// Wait for Ctrl-C or SIGTERM.
///
/// Pass to `axum::serve(..).with_graceful_shutdown(..)`; call
/// [`PdfService::shutdown()`] once `serve` returns.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("❌ Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("❌ Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("🛑 Ctrl-C received, draining connections..."),
        _ = terminate => log::info!("🛑 SIGTERM received, draining connections..."),
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn home() -> &'static str {
    BANNER
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::now())
}

async fn stats(State(service): PdfServiceState) -> Json<ServiceStats> {
    Json(service.stats())
}

async fn gerar_pdf(
    State(service): PdfServiceState,
    payload: Result<Json<PdfRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            log::warn!("Rejected body ({}): {}", rejection.status(), rejection.body_text());
            return rejection_error(&rejection, service.max_html_bytes()).into_response();
        }
    };

    match service.generate_pdf(request).await {
        Ok(pdf) => pdf_response(pdf),
        Err(e) => e.into_response(),
    }
}

fn rejection_error(rejection: &JsonRejection, limit: usize) -> PdfServiceError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PdfServiceError::PayloadTooLarge { limit }
    } else {
        PdfServiceError::InvalidInput(rejection.body_text())
    }
}

fn pdf_response(pdf: PdfResponse) -> Response {
    let disposition = HeaderValue::from_str(&pdf.content_disposition())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (CONTENT_DISPOSITION, disposition),
            (CONTENT_LENGTH, HeaderValue::from(pdf.size())),
            (CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        pdf.data,
    )
        .into_response()
}

impl IntoResponse for PdfServiceError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_error_into_response() {
        let response = PdfServiceError::PayloadTooLarge { limit: 10 }.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "PAYLOAD_TOO_LARGE");
    }

    #[test]
    fn test_pdf_response_headers() {
        let response = pdf_response(PdfResponse::new(b"%PDF-1.7".to_vec(), "documento.pdf".into()));

        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], "application/pdf");
        assert_eq!(headers[CONTENT_LENGTH], "8");
        assert_eq!(headers[CACHE_CONTROL], "no-store");
        assert_eq!(headers[CONTENT_DISPOSITION], "attachment; filename=\"documento.pdf\"");
    }
}
