//! Request, response and error types for the PDF service.
//!
//! These types are framework-agnostic; the axum façade in
//! [`integrations::axum`](crate::integrations::axum) maps them onto HTTP.
//!
//! # Error Status Mapping
//!
//! | Error | Status | Code |
//! |-------|--------|------|
//! | `InvalidInput` | 400 | `INVALID_INPUT` |
//! | `EmptyHtml` | 400 | `EMPTY_HTML` |
//! | `PayloadTooLarge` | 413 | `PAYLOAD_TOO_LARGE` |
//! | `LaunchFailed` | 500 | `LAUNCH_FAILED` |
//! | `BrowserCrash` | 500 | `BROWSER_CRASH` |
//! | `RenderTimeout` | 500 | `RENDER_TIMEOUT` |
//! | `LoadFailed` | 500 | `LOAD_FAILED` |
//! | `ExportFailed` | 500 | `EXPORT_FAILED` |
//! | `Internal` | 500 | `INTERNAL_ERROR` |
//! | `ShuttingDown` | 503 | `SHUTTING_DOWN` |

use serde::{Deserialize, Serialize};

use crate::error::BrowserError;

// ============================================================================
// Page format
// ============================================================================

/// Standard paper sizes accepted as page-format hints.
///
/// The format is only a fallback: `preferCSSPageSize` lets an
/// `@page { size: ... }` rule in the document win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperFormat {
    /// 297 x 420 mm
    #[serde(alias = "a3")]
    A3,
    /// 210 x 297 mm
    #[default]
    #[serde(alias = "a4")]
    A4,
    /// 148 x 210 mm
    #[serde(alias = "a5")]
    A5,
    /// 8.5 x 11 in
    #[serde(alias = "letter")]
    Letter,
    /// 8.5 x 14 in
    #[serde(alias = "legal")]
    Legal,
}

impl PaperFormat {
    /// Width and height in inches (portrait), as `Page.printToPDF` expects.
    pub fn inches(self) -> (f64, f64) {
        match self {
            PaperFormat::A3 => (11.69, 16.54),
            PaperFormat::A4 => (8.27, 11.69),
            PaperFormat::A5 => (5.83, 8.27),
            PaperFormat::Letter => (8.5, 11.0),
            PaperFormat::Legal => (8.5, 14.0),
        }
    }

    /// Viewport in CSS pixels at 96 dpi (portrait).
    ///
    /// ```rust
    /// use gerar_pdf_api::service::PaperFormat;
    ///
    /// assert_eq!(PaperFormat::A4.viewport(), (794, 1123));
    /// ```
    pub fn viewport(self) -> (u32, u32) {
        match self {
            PaperFormat::A3 => (1123, 1587),
            PaperFormat::A4 => (794, 1123),
            PaperFormat::A5 => (559, 794),
            PaperFormat::Letter => (816, 1056),
            PaperFormat::Legal => (816, 1344),
        }
    }

    /// Parse a case-insensitive format name (`a4`, `Letter`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "a3" => Some(PaperFormat::A3),
            "a4" => Some(PaperFormat::A4),
            "a5" => Some(PaperFormat::A5),
            "letter" => Some(PaperFormat::Letter),
            "legal" => Some(PaperFormat::Legal),
            _ => None,
        }
    }
}

/// Export options handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PdfOptions {
    /// Fallback paper size.
    pub format: PaperFormat,
    /// Landscape orientation.
    pub landscape: bool,
}

// ============================================================================
// Request
// ============================================================================

/// Body of `POST /api/gerar-pdf`.
///
/// Only `html` is required. A missing field deserializes to an empty string
/// and is rejected by [`validate()`](Self::validate).
///
/// # Example
///
/// ```rust
/// use gerar_pdf_api::service::{PaperFormat, PdfRequest};
///
/// let request: PdfRequest = serde_json::from_str(
///     r#"{"html": "<h1>Olá</h1>", "format": "Letter", "landscape": true}"#,
/// ).unwrap();
///
/// assert_eq!(request.format, Some(PaperFormat::Letter));
/// assert!(request.validate(1024).is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfRequest {
    /// The HTML document (or fragment) to render.
    #[serde(default)]
    pub html: String,

    /// Fallback paper size; defaults to the configured format.
    #[serde(default)]
    pub format: Option<PaperFormat>,

    /// Landscape orientation; defaults to portrait.
    #[serde(default)]
    pub landscape: Option<bool>,
}

impl PdfRequest {
    /// Build a request for `html` with default options.
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Self::default()
        }
    }

    /// Check the request before any render resources are reserved.
    ///
    /// # Errors
    ///
    /// - [`PdfServiceError::EmptyHtml`] if `html` is the empty string
    /// - [`PdfServiceError::PayloadTooLarge`] if `html` exceeds `max_bytes`
    pub fn validate(&self, max_bytes: usize) -> Result<(), PdfServiceError> {
        if self.html.is_empty() {
            return Err(PdfServiceError::EmptyHtml);
        }
        if self.html.len() > max_bytes {
            return Err(PdfServiceError::PayloadTooLarge { limit: max_bytes });
        }
        Ok(())
    }

    /// Resolve the export options against the configured default format.
    pub fn options(&self, default_format: PaperFormat) -> PdfOptions {
        PdfOptions {
            format: self.format.unwrap_or(default_format),
            landscape: self.landscape.unwrap_or(false),
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// A generated PDF document.
#[derive(Debug, Clone)]
pub struct PdfResponse {
    /// Raw PDF bytes, starting with `%PDF-`.
    pub data: Vec<u8>,

    /// Attachment filename.
    pub filename: String,
}

impl PdfResponse {
    /// Create a response.
    pub fn new(data: Vec<u8>, filename: String) -> Self {
        Self { data, filename }
    }

    /// `Content-Disposition` header value.
    ///
    /// ```rust
    /// use gerar_pdf_api::service::PdfResponse;
    ///
    /// let response = PdfResponse::new(vec![], "documento.pdf".to_string());
    /// assert_eq!(response.content_disposition(), r#"attachment; filename="documento.pdf""#);
    /// ```
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }

    /// Size of the PDF in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `true` while the process serves requests.
    pub ok: bool,

    /// RFC 3339 UTC timestamp of the probe.
    pub ts: String,
}

impl HealthResponse {
    /// Build a health payload stamped with the current time.
    pub fn now() -> Self {
        let ts = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { ok: true, ts }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced at the render task boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PdfServiceError {
    /// The body could not be parsed, or `html` was not a string.
    #[error("Invalid request: {0}")]
    InvalidInput(String),

    /// `html` was missing or blank.
    #[error("Send {{ \"html\": \"<html>...\" }} with a non-empty HTML string")]
    EmptyHtml,

    /// The body or the HTML exceeded the configured limit.
    #[error("Payload exceeds the limit of {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The browser process could not be started.
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    /// The browser died while rendering; it will be relaunched on the next request.
    #[error("Browser crashed during render: {0}")]
    BrowserCrash(String),

    /// A wait step exceeded its bound.
    #[error("Render timed out: {0}")]
    RenderTimeout(String),

    /// The document could not be loaded into the page.
    #[error("Failed to load content: {0}")]
    LoadFailed(String),

    /// `Page.printToPDF` failed or returned something that is not a PDF.
    #[error("PDF export failed: {0}")]
    ExportFailed(String),

    /// The service is stopping.
    #[error("Service is shutting down")]
    ShuttingDown,

    /// Unexpected failure (worker panic, join error, ...).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfServiceError {
    /// HTTP status code for this error.
    ///
    /// ```rust
    /// use gerar_pdf_api::service::PdfServiceError;
    ///
    /// assert_eq!(PdfServiceError::EmptyHtml.status_code(), 400);
    /// assert_eq!(PdfServiceError::RenderTimeout("fonts".into()).status_code(), 500);
    /// ```
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::EmptyHtml => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::ShuttingDown => 503,
            Self::LaunchFailed(_)
            | Self::BrowserCrash(_)
            | Self::RenderTimeout(_)
            | Self::LoadFailed(_)
            | Self::ExportFailed(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code, returned as `error` in JSON bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::EmptyHtml => "EMPTY_HTML",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::LaunchFailed(_) => "LAUNCH_FAILED",
            Self::BrowserCrash(_) => "BROWSER_CRASH",
            Self::RenderTimeout(_) => "RENDER_TIMEOUT",
            Self::LoadFailed(_) => "LOAD_FAILED",
            Self::ExportFailed(_) => "EXPORT_FAILED",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns `true` if retrying the same request may succeed.
    ///
    /// A crashed browser is relaunched by the next request, so crashes and
    /// launch failures are retryable. Client errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LaunchFailed(_) | Self::BrowserCrash(_) | Self::RenderTimeout(_)
        )
    }
}

impl From<BrowserError> for PdfServiceError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Launch(msg) | BrowserError::Configuration(msg) => {
                PdfServiceError::LaunchFailed(msg)
            }
            BrowserError::Crashed(msg) | BrowserError::HealthCheckFailed(msg) => {
                PdfServiceError::BrowserCrash(msg)
            }
            BrowserError::PageCreation(msg) => PdfServiceError::Internal(msg),
            BrowserError::ShuttingDown => PdfServiceError::ShuttingDown,
        }
    }
}

/// JSON error body: `{ "error": CODE, "detail"?: message }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code (see [`PdfServiceError::error_code()`]).
    pub error: String,

    /// Human-readable explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&PdfServiceError> for ErrorResponse {
    fn from(err: &PdfServiceError) -> Self {
        Self {
            error: err.error_code().to_string(),
            detail: Some(err.to_string()),
        }
    }
}

impl From<PdfServiceError> for ErrorResponse {
    fn from(err: PdfServiceError) -> Self {
        Self::from(&err)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_empty_object() {
        let request: PdfRequest = serde_json::from_str("{}").unwrap();
        assert!(request.html.is_empty());
        assert_eq!(request.validate(100), Err(PdfServiceError::EmptyHtml));
        assert_eq!(request.options(PaperFormat::A4), PdfOptions::default());
    }

    /// Verifies that a non-string html is a deserialization error, not an empty string.
    #[test]
    fn test_request_rejects_non_string_html() {
        let result: Result<PdfRequest, _> = serde_json::from_str(r#"{"html": 42}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_validation() {
        assert_eq!(PdfRequest::new("").validate(100), Err(PdfServiceError::EmptyHtml));
        assert!(PdfRequest::new("   \n").validate(100).is_ok(), "Whitespace is still a document");
        assert_eq!(
            PdfRequest::new("<p>0123456789</p>").validate(10),
            Err(PdfServiceError::PayloadTooLarge { limit: 10 })
        );
        assert!(PdfRequest::new("<h1>Hello</h1>").validate(100).is_ok());
    }

    #[test]
    fn test_request_options_override_default_format() {
        let request = PdfRequest {
            html: "<p>x</p>".to_string(),
            format: Some(PaperFormat::Legal),
            landscape: Some(true),
        };
        let options = request.options(PaperFormat::A4);
        assert_eq!(options.format, PaperFormat::Legal);
        assert!(options.landscape);
    }

    #[test]
    fn test_paper_format_parse() {
        assert_eq!(PaperFormat::parse("a4"), Some(PaperFormat::A4));
        assert_eq!(PaperFormat::parse(" LETTER "), Some(PaperFormat::Letter));
        assert_eq!(PaperFormat::parse("tabloid"), None);
    }

    #[test]
    fn test_pdf_response_content_disposition() {
        let response = PdfResponse::new(b"%PDF-1.7".to_vec(), "documento.pdf".to_string());
        assert_eq!(response.content_disposition(), "attachment; filename=\"documento.pdf\"");
        assert_eq!(response.size(), 8);
    }

    /// Verifies the status code of every error variant.
    #[test]
    fn test_error_status_codes() {
        assert_eq!(PdfServiceError::InvalidInput("x".into()).status_code(), 400);
        assert_eq!(PdfServiceError::EmptyHtml.status_code(), 400);
        assert_eq!(PdfServiceError::PayloadTooLarge { limit: 1 }.status_code(), 413);
        assert_eq!(PdfServiceError::LaunchFailed("x".into()).status_code(), 500);
        assert_eq!(PdfServiceError::BrowserCrash("x".into()).status_code(), 500);
        assert_eq!(PdfServiceError::RenderTimeout("x".into()).status_code(), 500);
        assert_eq!(PdfServiceError::LoadFailed("x".into()).status_code(), 500);
        assert_eq!(PdfServiceError::ExportFailed("x".into()).status_code(), 500);
        assert_eq!(PdfServiceError::Internal("x".into()).status_code(), 500);
        assert_eq!(PdfServiceError::ShuttingDown.status_code(), 503);
    }

    #[test]
    fn test_error_retryable() {
        assert!(PdfServiceError::BrowserCrash("x".into()).is_retryable());
        assert!(!PdfServiceError::EmptyHtml.is_retryable());
        assert!(!PdfServiceError::ShuttingDown.is_retryable());
    }

    #[test]
    fn test_browser_error_conversion() {
        let err: PdfServiceError = BrowserError::Launch("no chrome".into()).into();
        assert_eq!(err, PdfServiceError::LaunchFailed("no chrome".into()));

        let err: PdfServiceError = BrowserError::Crashed("gone".into()).into();
        assert_eq!(err.error_code(), "BROWSER_CRASH");

        let err: PdfServiceError = BrowserError::ShuttingDown.into();
        assert_eq!(err, PdfServiceError::ShuttingDown);
    }

    #[test]
    fn test_error_response_shape() {
        let body = serde_json::to_value(ErrorResponse::from(PdfServiceError::EmptyHtml)).unwrap();
        assert_eq!(body["error"], "EMPTY_HTML");
        assert!(body["detail"].as_str().unwrap().contains("html"));

        let bare = ErrorResponse {
            error: "X".to_string(),
            detail: None,
        };
        let json = serde_json::to_string(&bare).unwrap();
        assert_eq!(json, r#"{"error":"X"}"#);
    }

    #[test]
    fn test_health_response_now() {
        let health = HealthResponse::now();
        assert!(health.ok);
        assert!(health.ts.ends_with('Z'), "expected UTC timestamp, got {}", health.ts);
    }
}
