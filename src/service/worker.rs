//! Render worker: one page, one document, one PDF.
//!
//! [`RenderWorker::render()`] drives a single page through the render
//! pipeline:
//!
//! ```text
//! open page ──▶ print media ──▶ block resources? ──▶ normalize HTML
//!     │                                                   │
//!     │                                                   ▼
//!     │            export PDF ◀── readiness waits ◀── load content
//!     │                 │
//!     └── PageGuard ────┴──▶ page closed on every exit path
//! ```
//!
//! Every step is blocking. The render service calls the worker from
//! `spawn_blocking`.
//!
//! # Failure Classification
//!
//! After a step fails the worker probes the browser. A dead browser means
//! [`PdfServiceError::BrowserCrash`] and the handle is marked crashed so the
//! next request relaunches. A live browser means the failure belongs to this
//! document only and the shared browser is left alone.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ServiceConfig;
use crate::error::PageError;
use crate::handle::BrowserHandle;
use crate::traits::PageSession;

use super::html::normalize_html;
use super::policy::{ReadinessPolicy, ResourcePolicy};
use super::types::{PdfOptions, PdfServiceError};

/// Quiet period required by [`ReadinessPolicy::NetworkIdle`].
const NETWORK_IDLE_MS: u64 = 500;

/// Placeholder replaced with the wait bound in the readiness scripts.
const BOUND_PLACEHOLDER: &str = "__BOUND_MS__";

const DOM_READY_JS: &str = r#"new Promise(resolve => {
    setTimeout(() => resolve(false), __BOUND_MS__);
    if (document.readyState !== 'loading') { resolve(true); return; }
    document.addEventListener('DOMContentLoaded', () => resolve(true), { once: true });
})"#;

const WINDOW_LOAD_JS: &str = r#"new Promise(resolve => {
    setTimeout(() => resolve(false), __BOUND_MS__);
    if (document.readyState === 'complete') { resolve(true); return; }
    window.addEventListener('load', () => resolve(true), { once: true });
})"#;

const FONTS_READY_JS: &str = r#"Promise.race([
    document.fonts.ready.then(() => true),
    new Promise(resolve => setTimeout(() => resolve(false), __BOUND_MS__)),
])"#;

const IMAGES_DECODED_JS: &str = r#"Promise.race([
    Promise.all(Array.from(document.images).map(img =>
        img.complete ? Promise.resolve() : img.decode().catch(() => undefined)
    )).then(() => true),
    new Promise(resolve => setTimeout(() => resolve(false), __BOUND_MS__)),
])"#;

const NETWORK_IDLE_JS: &str = r#"new Promise(resolve => {
    const started = Date.now();
    let seen = performance.getEntriesByType('resource').length;
    let quietSince = started;
    const tick = () => {
        const now = Date.now();
        const count = performance.getEntriesByType('resource').length;
        if (count !== seen) { seen = count; quietSince = now; }
        if (now - quietSince >= __IDLE_MS__) { resolve(true); return; }
        if (now - started >= __BOUND_MS__) { resolve(false); return; }
        setTimeout(tick, 50);
    };
    tick();
})"#;

/// Stage of the pipeline, used to classify failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Setup,
    Load,
    Ready(&'static str),
    Export,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Setup => f.write_str("page setup"),
            Step::Load => f.write_str("content load"),
            Step::Ready(what) => write!(f, "waiting for {}", what),
            Step::Export => f.write_str("PDF export"),
        }
    }
}

/// Closes the page when dropped.
struct PageGuard {
    page: Box<dyn PageSession>,
}

impl std::ops::Deref for PageGuard {
    type Target = dyn PageSession;

    fn deref(&self) -> &Self::Target {
        self.page.as_ref()
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        log::trace!("Closing page");
        if let Err(e) = self.page.close() {
            log::warn!("Failed to close page (browser may be gone): {}", e);
        }
    }
}

/// Per-render settings and the pipeline itself.
///
/// Cheap to clone; the render service keeps one and clones it into every
/// blocking job.
#[derive(Debug, Clone)]
pub struct RenderWorker {
    navigation_timeout: Duration,
    content_timeout: Duration,
    readiness: ReadinessPolicy,
    resources: Arc<ResourcePolicy>,
}

impl RenderWorker {
    /// Create a worker with the given navigation and content bounds,
    /// [`ReadinessPolicy::Dom`] and no resource blocking.
    pub fn new(navigation_timeout: Duration, content_timeout: Duration) -> Self {
        Self {
            navigation_timeout,
            content_timeout,
            readiness: ReadinessPolicy::default(),
            resources: Arc::new(ResourcePolicy::default()),
        }
    }

    /// Build from service configuration.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.navigation_timeout, config.content_timeout)
            .with_readiness(config.readiness)
            .with_resource_policy(config.resource_policy.clone())
    }

    /// Set the readiness policy.
    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Set the sub-resource policy.
    pub fn with_resource_policy(mut self, policy: ResourcePolicy) -> Self {
        self.resources = Arc::new(policy);
        self
    }

    /// Configured readiness policy.
    pub fn readiness(&self) -> ReadinessPolicy {
        self.readiness
    }

    /// Render `html` to PDF bytes on `browser`.
    ///
    /// Gives up with [`PdfServiceError::RenderTimeout`] once `deadline`
    /// passes; the check runs between steps and every wait is capped by the
    /// time left.
    ///
    /// # Errors
    ///
    /// - [`PdfServiceError::RenderTimeout`] if any wait exceeds its bound
    /// - [`PdfServiceError::BrowserCrash`] if the browser died (the handle is
    ///   marked crashed)
    /// - [`PdfServiceError::LoadFailed`] if the document could not be loaded
    /// - [`PdfServiceError::ExportFailed`] if printing failed or produced
    ///   something that is not a PDF
    pub fn render(
        &self,
        browser: &BrowserHandle,
        html: &str,
        options: &PdfOptions,
        deadline: Instant,
    ) -> Result<Vec<u8>, PdfServiceError> {
        let started = Instant::now();
        check_deadline(deadline, Step::Setup)?;

        let page = PageGuard {
            page: browser.open_page().map_err(|e| {
                log::error!("❌ Failed to open page on browser {}: {}", browser.id(), e);
                if !browser.is_alive() {
                    browser.mark_crashed("page could not be opened");
                    return PdfServiceError::BrowserCrash(e.to_string());
                }
                PdfServiceError::from(e)
            })?,
        };

        page.emulate_print_media()
            .map_err(|e| self.classify(browser, Step::Setup, e))?;

        if self.resources.is_active() {
            log::trace!("Installing resource policy: {:?}", self.resources);
            page.block_resources(Arc::clone(&self.resources))
                .map_err(|e| self.classify(browser, Step::Setup, e))?;
        }

        let document = normalize_html(html);

        check_deadline(deadline, Step::Load)?;
        let load_started = Instant::now();
        page.set_content(&document, bounded(self.navigation_timeout, deadline))
            .map_err(|e| self.classify(browser, Step::Load, e))?;
        log::debug!("Content loaded in {:?}", load_started.elapsed());

        self.wait_until_ready(browser, &page, deadline)?;

        check_deadline(deadline, Step::Export)?;
        let export_started = Instant::now();
        let pdf = page
            .print_pdf(options)
            .map_err(|e| self.classify(browser, Step::Export, e))?;

        if !pdf.starts_with(b"%PDF-") {
            log::error!("❌ Export returned {} bytes that are not a PDF", pdf.len());
            return Err(PdfServiceError::ExportFailed(
                "browser output is not a PDF document".to_string(),
            ));
        }

        log::debug!(
            "PDF exported in {:?} ({} bytes, total render {:?})",
            export_started.elapsed(),
            pdf.len(),
            started.elapsed()
        );
        Ok(pdf)
    }

    fn wait_until_ready(
        &self,
        browser: &BrowserHandle,
        page: &PageGuard,
        deadline: Instant,
    ) -> Result<(), PdfServiceError> {
        let waits: &[(&'static str, &str)] = match self.readiness {
            ReadinessPolicy::Dom => &[
                ("DOM ready", DOM_READY_JS),
                ("fonts", FONTS_READY_JS),
                ("images", IMAGES_DECODED_JS),
            ],
            ReadinessPolicy::Load => &[
                ("window load", WINDOW_LOAD_JS),
                ("fonts", FONTS_READY_JS),
                ("images", IMAGES_DECODED_JS),
            ],
            ReadinessPolicy::NetworkIdle => &[
                ("window load", WINDOW_LOAD_JS),
                ("network idle", NETWORK_IDLE_JS),
            ],
        };

        for &(what, script) in waits {
            let step = Step::Ready(what);
            check_deadline(deadline, step)?;

            let bound = bounded(self.content_timeout, deadline);
            let waited = Instant::now();
            let ready = page
                .evaluate_bool(&readiness_script(script, bound), true)
                .map_err(|e| self.classify(browser, step, e))?;

            if !ready {
                log::warn!("⏱️ Gave up {} after {:?}", step, waited.elapsed());
                return Err(PdfServiceError::RenderTimeout(format!(
                    "{} exceeded {:?}",
                    step, bound
                )));
            }
            log::trace!("{} done in {:?}", step, waited.elapsed());
        }
        Ok(())
    }

    fn classify(&self, browser: &BrowserHandle, step: Step, error: PageError) -> PdfServiceError {
        if !browser.is_alive() {
            log::error!("💥 Browser {} died during {}: {}", browser.id(), step, error);
            browser.mark_crashed(&format!("died during {}", step));
            return PdfServiceError::BrowserCrash(format!("{}: {}", step, error));
        }

        log::warn!("⚠️ {} failed: {}", step, error);
        match (step, error) {
            (_, PageError::Timeout(bound)) => {
                PdfServiceError::RenderTimeout(format!("{} exceeded {:?}", step, bound))
            }
            (Step::Load | Step::Ready(_), PageError::Protocol(msg)) => {
                PdfServiceError::LoadFailed(msg)
            }
            (Step::Export, PageError::Protocol(msg)) => PdfServiceError::ExportFailed(msg),
            (Step::Setup, PageError::Protocol(msg)) => {
                PdfServiceError::Internal(format!("{}: {}", step, msg))
            }
        }
    }
}

fn check_deadline(deadline: Instant, step: Step) -> Result<(), PdfServiceError> {
    if Instant::now() >= deadline {
        log::warn!("⏱️ Render deadline passed before {}", step);
        Err(PdfServiceError::RenderTimeout(format!(
            "render deadline passed before {}",
            step
        )))
    } else {
        Ok(())
    }
}

/// `limit`, capped by the time left until `deadline`.
fn bounded(limit: Duration, deadline: Instant) -> Duration {
    limit.min(deadline.saturating_duration_since(Instant::now()))
}

fn readiness_script(template: &str, bound: Duration) -> String {
    template
        .replace(BOUND_PLACEHOLDER, &bound.as_millis().to_string())
        .replace("__IDLE_MS__", &NETWORK_IDLE_MS.to_string())
}

// ============================================================================
// Unit Tests
// ============================================================================
