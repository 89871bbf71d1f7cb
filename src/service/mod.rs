//! PDF generation service module.
//!
//! The **framework-agnostic core**: request and error types, render
//! policies, the render worker and the [`PdfService`] that bounds and
//! supervises renders. The axum façade in
//! [`integrations::axum`](crate::integrations::axum) is a thin mapping of
//! this module onto HTTP.
//!
//! # Module Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       service module                         │
//! │                                                              │
//! │  types.rs     PdfRequest, PdfResponse, PdfServiceError, ...  │
//! │  policy.rs    ReadinessPolicy, ResourcePolicy                │
//! │  html.rs      normalize_html()                               │
//! │  worker.rs    RenderWorker (one page, one PDF)               │
//! │  pdf.rs       PdfService (gate + browser + worker)           │
//! └──────────────────────────────────────────────────────────────┘
//!                              │ used by
//!                              ▼
//!              integrations::axum (handlers, CORS)
//! ```
//!
//! # Design Philosophy
//!
//! "Thin handler, thick service":
//!
//! | Layer | Responsibility | This Module? |
//! |-------|----------------|--------------|
//! | **Service** | Validation, admission, rendering, error taxonomy | ✅ Yes |
//! | **Handler** | Body extraction, status codes, headers | ❌ No (integrations) |

mod html;
mod pdf;
mod policy;
mod types;
mod worker;

// ============================================================================
// Re-exports: Types
// ============================================================================

pub use types::ErrorResponse;
pub use types::HealthResponse;
pub use types::PaperFormat;
pub use types::PdfOptions;
pub use types::PdfRequest;
pub use types::PdfResponse;
pub use types::PdfServiceError;

pub use policy::ReadinessPolicy;
pub use policy::ResourceKind;
pub use policy::ResourcePolicy;
pub use policy::ResourceRequest;

// ============================================================================
// Re-exports: Service and helpers
// ============================================================================

pub use pdf::PdfService;
pub use worker::RenderWorker;

pub use html::normalize_html;
pub use policy::wildcard_match;

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify error type conversions work.
    #[test]
    fn test_error_to_response_conversion() {
        let error = PdfServiceError::RenderTimeout("fonts exceeded 15s".to_string());
        let response: ErrorResponse = error.into();

        assert_eq!(response.error, "RENDER_TIMEOUT");
        assert!(response.detail.unwrap().contains("fonts"));
    }
}
