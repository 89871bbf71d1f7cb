//! # gerar-pdf-api
//!
//! HTML to PDF microservice backed by one managed headless Chrome process.
//!
//! Clients `POST` an HTML document; the service renders it in an isolated
//! page of a shared browser and answers with the PDF bytes.
//!
//! ## Features
//!
//! - **Single Managed Browser**: launched lazily (or at startup), shared by
//!   every render, relaunched transparently after a crash or disconnect
//! - **Bounded Concurrency**: a FIFO gate caps simultaneous renders; excess
//!   requests queue instead of opening unbounded pages
//! - **Bounded Waits**: navigation, readiness and whole-render timeouts, each
//!   configurable
//! - **Guaranteed Cleanup**: pages and gate slots are released on every exit
//!   path, including timeouts, panics and client disconnects
//! - **Graceful Shutdown**: the browser is closed exactly once on SIGTERM or
//!   Ctrl-C
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        HTTP façade (axum + tower-http)      │
//! │  GET /health   POST /api/gerar-pdf   ...    │
//! └─────────────────┬───────────────────────────┘
//!                   │ PdfRequest
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │                PdfService                   │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   RenderGate (FIFO, max N in flight)    │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   RenderWorker (one page per render)    │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   BrowserManager                        │ │
//! │ │   (lazy launch, relaunch, keep-alive)   │ │
//! │ └─────────────────────────────────────────┘ │
//! └─────────────────┬───────────────────────────┘
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │        Headless Chrome (one process)        │
//! │     (driven by the headless_chrome crate)   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gerar_pdf_api::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfigBuilder::new().max_concurrency(2).build()?;
//!     let service = PdfService::from_config(&config)?;
//!
//!     let pdf = service.generate_pdf(PdfRequest::new("<h1>Olá</h1>")).await?;
//!     std::fs::write(&pdf.filename, &pdf.data)?;
//!
//!     service.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Configuration
//!
//! With the `env-config` feature (default), [`config::env::from_env()`]
//! reads `PORT`, `PDF_CONCURRENCY`, the `PDF_*_TIMEOUT` variables and the
//! rest of the table documented in [`mod@config::env`], loading `app.env`
//! first when present.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `env-config` | Environment/`app.env` configuration and the binary (default) |
//! | `test-utils` | Mock browser engine in [`factory::mock`] |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod error;
pub mod factory;
pub mod gate;
pub mod handle;
pub mod integrations;
pub mod manager;
pub mod prelude;
pub mod service;
pub mod stats;
pub mod traits;

// Internal modules (not publicly exposed)
pub(crate) mod tracked;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{BrowserError, PageError, PageResult, Result};
pub use factory::{BrowserFactory, ChromeBrowserFactory, LaunchSettings, create_chrome_options};
pub use gate::{GatePermit, RenderGate};
pub use handle::BrowserHandle;
pub use manager::{BrowserManager, BrowserManagerBuilder, BrowserStatus};
pub use service::{PdfRequest, PdfResponse, PdfService, PdfServiceError};
pub use stats::{BrowserStats, GateStats, RenderStats, ServiceStats};
pub use traits::{BrowserProcess, Healthcheck, PageSession};

#[cfg(feature = "env-config")]
pub use config::env::{chrome_path_from_env, from_env};

// ============================================================================
// Convenience type aliases
// ============================================================================

/// Shared render service type for web handlers.
///
/// ```rust,ignore
/// let service: SharedPdfService = Arc::new(PdfService::from_config(&config)?);
/// ```
pub type SharedPdfService = std::sync::Arc<PdfService>;
