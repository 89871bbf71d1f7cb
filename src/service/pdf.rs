//! Render service: the task boundary between HTTP and the browser.
//!
//! [`PdfService`] ties the pieces together for one request:
//!
//! ```text
//! PdfRequest
//!   │ validate (400/413, no page is ever opened)
//!   ▼
//! RenderGate::acquire ──── queued FIFO while max renders are in flight
//!   │ GatePermit
//!   ▼
//! spawn_blocking ───────── permit moved in, released when the job ends
//!   │ BrowserManager::acquire (lazy launch / relaunch)
//!   │ RenderWorker::render  (page closed on every exit path)
//!   ▼
//! timeout_at(deadline) ─── caller answered with RENDER_TIMEOUT when it fires;
//!   │                      the detached job stops at its next deadline check
//!   ▼
//! PdfResponse
//! ```
//!
//! Every failure is caught here, logged with the request id, the input size
//! and the elapsed time, and returned as a [`PdfServiceError`]. Worker panics
//! surface as join errors and become [`PdfServiceError::Internal`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::BrowserError;
use crate::factory::{BrowserFactory, ChromeBrowserFactory, LaunchSettings};
use crate::gate::RenderGate;
use crate::manager::BrowserManager;
use crate::stats::{RenderCounters, ServiceStats};

use super::types::{PaperFormat, PdfRequest, PdfResponse, PdfServiceError};
use super::worker::RenderWorker;

/// HTML to PDF render service.
///
/// Share it behind an [`Arc`]; every method takes `&self`.
///
/// # Example
///
/// ```rust,ignore
/// let config = gerar_pdf_api::config::env::from_env()?;
/// let service = Arc::new(PdfService::from_config(&config)?);
///
/// let response = service.generate_pdf(PdfRequest::new("<h1>Olá</h1>")).await?;
/// assert!(response.data.starts_with(b"%PDF-"));
///
/// service.shutdown();
/// ```
pub struct PdfService {
    browser: Arc<BrowserManager>,
    gate: RenderGate,
    worker: RenderWorker,
    filename: String,
    default_format: PaperFormat,
    max_html_bytes: usize,
    render_timeout: Duration,
    counters: RenderCounters,
}

impl PdfService {
    /// Create a service over an arbitrary browser factory.
    ///
    /// No browser is launched until the first render or
    /// [`warmup()`](Self::warmup).
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Configuration`] for invalid keep-alive settings.
    pub fn new(
        config: &ServiceConfig,
        factory: Box<dyn BrowserFactory>,
    ) -> Result<Self, BrowserError> {
        let browser = BrowserManager::builder()
            .factory(factory)
            .ping_interval(config.ping_interval)
            .max_ping_failures(config.max_ping_failures)
            .enable_keep_alive(config.keep_alive)
            .build()?;

        log::info!(
            "🧾 PDF service ready (concurrency: {}, render timeout: {:?}, readiness: {})",
            config.max_concurrency,
            config.render_timeout,
            config.readiness
        );

        Ok(Self {
            browser: Arc::new(browser),
            gate: RenderGate::new(config.max_concurrency),
            worker: RenderWorker::from_config(config),
            filename: config.filename.clone(),
            default_format: config.paper_format,
            max_html_bytes: config.body_limit,
            render_timeout: config.render_timeout,
            counters: RenderCounters::default(),
        })
    }

    /// Create a service backed by Chrome, launched per `config`.
    ///
    /// # Errors
    ///
    /// Same as [`new()`](Self::new).
    pub fn from_config(config: &ServiceConfig) -> Result<Self, BrowserError> {
        let factory = ChromeBrowserFactory::from_settings(LaunchSettings {
            chrome_path: config.chrome_path.clone(),
            window_size: config.paper_format.viewport(),
            protocol_timeout: config.protocol_timeout,
        });
        Self::new(config, Box::new(factory))
    }

    /// Render one request.
    ///
    /// # Errors
    ///
    /// - [`PdfServiceError::EmptyHtml`] / [`PdfServiceError::PayloadTooLarge`]
    ///   before anything is queued
    /// - [`PdfServiceError::ShuttingDown`] once [`shutdown()`](Self::shutdown)
    ///   has been called
    /// - any render failure from the worker or the browser manager
    pub async fn generate_pdf(&self, request: PdfRequest) -> Result<PdfResponse, PdfServiceError> {
        let request_id = Uuid::new_v4().simple().to_string();
        let request_id = &request_id[..8];
        let input_size = request.html.len();
        let started = Instant::now();

        if let Err(e) = request.validate(self.max_html_bytes) {
            log::warn!("[{}] Rejected request ({} bytes): {}", request_id, input_size, e);
            return Err(e);
        }
        let options = request.options(self.default_format);

        let permit = self.gate.acquire().await.inspect_err(|e| {
            log::warn!("[{}] Not admitted: {}", request_id, e);
        })?;

        log::info!(
            "[{}] 📄 Rendering {} bytes of HTML ({:?}{}, queued {:?})",
            request_id,
            input_size,
            options.format,
            if options.landscape { ", landscape" } else { "" },
            started.elapsed()
        );

        let deadline = Instant::now() + self.render_timeout;
        let browser = Arc::clone(&self.browser);
        let worker = self.worker.clone();
        let html = request.html;

        let job = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let handle = browser.acquire()?;
            worker.render(&handle, &html, &options, deadline)
        });

        let deadline_at = tokio::time::Instant::from_std(deadline);
        let result = match tokio::time::timeout_at(deadline_at, job).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                let detail = if join_error.is_panic() {
                    "render task panicked".to_string()
                } else {
                    format!("render task failed: {}", join_error)
                };
                Err(PdfServiceError::Internal(detail))
            }
            Err(_) => Err(PdfServiceError::RenderTimeout(format!(
                "render exceeded {:?}",
                self.render_timeout
            ))),
        };

        match result {
            Ok(data) => {
                self.counters.record_success();
                log::info!(
                    "[{}] ✅ PDF generated: {} bytes in {:?}",
                    request_id,
                    data.len(),
                    started.elapsed()
                );
                Ok(PdfResponse::new(data, self.filename.clone()))
            }
            Err(e) => {
                self.counters
                    .record_failure(matches!(e, PdfServiceError::RenderTimeout(_)));
                log::error!(
                    "[{}] ❌ Render failed after {:?} ({} bytes of HTML): {}",
                    request_id,
                    started.elapsed(),
                    input_size,
                    e
                );
                Err(e)
            }
        }
    }

    /// Launch the browser now instead of on the first request.
    ///
    /// # Errors
    ///
    /// Returns the launch error; the next request will try again.
    pub async fn warmup(&self) -> Result<(), BrowserError> {
        self.browser.warmup().await
    }

    /// The browser lifecycle manager.
    pub fn browser(&self) -> &BrowserManager {
        &self.browser
    }

    /// Attachment filename for responses.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Largest accepted `html`, in bytes.
    pub fn max_html_bytes(&self) -> usize {
        self.max_html_bytes
    }

    /// Snapshot for the stats endpoint.
    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            gate: self.gate.stats(),
            browser: self.browser.stats(),
            renders: self.counters.snapshot(),
        }
    }

    /// Stop admitting renders and close the browser.
    ///
    /// Idempotent. Renders already running keep their page until they
    /// finish; the browser process exits once the last one lets go.
    pub fn shutdown(&self) {
        log::info!("🛑 Shutting down PDF service...");
        self.gate.close();
        self.browser.shutdown();
    }
}

impl std::fmt::Debug for PdfService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfService")
            .field("gate", &self.gate.stats())
            .field("browser", &self.browser)
            .field("filename", &self.filename)
            .field("render_timeout", &self.render_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
