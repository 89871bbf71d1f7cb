//! Chrome/Chromium engine adapter.
//!
//! This module provides [`ChromeBrowserFactory`], which launches headless
//! Chrome through `headless_chrome`, and the private adapters that implement
//! [`BrowserProcess`] and [`PageSession`] on top of a `Browser` and its tabs.
//!
//! # Page primitives
//!
//! | Primitive | DevTools call |
//! |-----------|---------------|
//! | `emulate_print_media` | `Emulation.setEmulatedMedia { media: "print" }` |
//! | `block_resources` | `Fetch.enable` + request interceptor |
//! | `set_content` | `Page.getFrameTree` + `Page.setDocumentContent` |
//! | `evaluate_bool` | `Runtime.evaluate` |
//! | `print_pdf` | `Page.printToPDF` |
//! | `close` | `Target.closeTarget` |
//!
//! # Example
//!
//! ```rust,ignore
//! use gerar_pdf_api::ChromeBrowserFactory;
//!
//! // Auto-detect Chrome installation
//! let factory = ChromeBrowserFactory::with_defaults();
//!
//! // Or specify custom path
//! let factory = ChromeBrowserFactory::with_path("/usr/bin/chromium".to_string());
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision};
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::protocol::cdp::Fetch::FailRequest;
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};

use super::BrowserFactory;
use crate::error::{BrowserError, PageError, PageResult, Result};
use crate::service::{PaperFormat, PdfOptions, ResourceKind, ResourcePolicy, ResourceRequest};
use crate::traits::{BrowserProcess, Healthcheck, PageSession};

/// Settings that shape each Chrome launch.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    /// Explicit browser executable; `None` lets `headless_chrome` search.
    pub chrome_path: Option<String>,

    /// Window size in CSS pixels. Defaults to A4 at 96 dpi (794x1123) so
    /// layout happens at roughly the printed width.
    pub window_size: (u32, u32),

    /// How long the DevTools connection may stay silent before the driver
    /// gives up on the browser.
    pub protocol_timeout: Duration,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            window_size: PaperFormat::A4.viewport(),
            protocol_timeout: Duration::from_secs(60),
        }
    }
}

/// Factory for launching Chrome/Chromium browser processes.
///
/// # Thread Safety
///
/// This factory is `Send + Sync` and can be safely shared across threads.
pub struct ChromeBrowserFactory {
    /// Function that generates launch options for each launch.
    launch_options_fn: Box<dyn Fn() -> Result<LaunchOptions<'static>> + Send + Sync>,
}

impl ChromeBrowserFactory {
    /// Create factory with a custom launch options function.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use gerar_pdf_api::{BrowserError, ChromeBrowserFactory, LaunchSettings, create_chrome_options};
    ///
    /// let factory = ChromeBrowserFactory::new(|| {
    ///     create_chrome_options(&LaunchSettings::default())
    ///         .map_err(|e| BrowserError::Configuration(e.to_string()))
    /// });
    /// ```
    pub fn new<F>(launch_options_fn: F) -> Self
    where
        F: Fn() -> Result<LaunchOptions<'static>> + Send + Sync + 'static,
    {
        Self {
            launch_options_fn: Box::new(launch_options_fn),
        }
    }

    /// Create factory from explicit [`LaunchSettings`].
    pub fn from_settings(settings: LaunchSettings) -> Self {
        log::debug!(
            "🔧 Creating ChromeBrowserFactory (path: {}, window: {}x{}, protocol timeout: {:?})",
            settings.chrome_path.as_deref().unwrap_or("auto-detect"),
            settings.window_size.0,
            settings.window_size.1,
            settings.protocol_timeout
        );
        Self::new(move || {
            create_chrome_options(&settings)
                .map_err(|e| BrowserError::Configuration(e.to_string()))
        })
    }

    /// Create factory with auto-detected Chrome path and default settings.
    pub fn with_defaults() -> Self {
        Self::from_settings(LaunchSettings::default())
    }

    /// Create factory with a custom Chrome binary path.
    pub fn with_path(chrome_path: String) -> Self {
        Self::from_settings(LaunchSettings {
            chrome_path: Some(chrome_path),
            ..LaunchSettings::default()
        })
    }
}

impl BrowserFactory for ChromeBrowserFactory {
    /// Launch a new Chrome process.
    ///
    /// # Errors
    ///
    /// * Returns [`BrowserError::Configuration`] if launch options generation fails.
    /// * Returns [`BrowserError::Launch`] if Chrome fails to start.
    fn create(&self) -> Result<Box<dyn BrowserProcess>> {
        let options = (self.launch_options_fn)()?;

        log::debug!("🚀 Launching Chrome browser...");
        let browser = Browser::new(options).map_err(|e| {
            log::error!("❌ Chrome launch failed: {}", e);
            BrowserError::Launch(e.to_string())
        })?;

        Ok(Box::new(ChromeProcess { browser }))
    }
}

/// Create Chrome launch options from [`LaunchSettings`].
///
/// # Chrome Flags Applied
///
/// ## Memory and Performance
/// - `--disable-dev-shm-usage` - Use /tmp instead of /dev/shm (container-friendly)
/// - `--disable-crash-reporter`
///
/// ## GPU and Rendering
/// - `--disable-gpu`, `--disable-software-rasterizer`
/// - `--hide-scrollbars` - Scrollbars never end up in the PDF
/// - `--font-render-hinting=none` - Stable glyph metrics between runs
///
/// ## Disabled Features
/// - `--disable-extensions`, `--disable-sync`, `--disable-default-apps`
/// - `--no-first-run`
///
/// ## Stability
/// - `--disable-background-timer-throttling`
/// - `--disable-backgrounding-occluded-windows`
/// - `--disable-renderer-backgrounding`
/// - `--disable-hang-monitor`
/// - `--disable-ipc-flooding-protection`
///
/// # Errors
///
/// Returns error if the options builder fails.
pub fn create_chrome_options(
    settings: &LaunchSettings,
) -> std::result::Result<LaunchOptions<'static>, Box<dyn std::error::Error + Send + Sync>> {
    let mut builder = LaunchOptions::default_builder();

    if let Some(path) = settings.chrome_path.as_deref() {
        builder.path(Some(path.to_string().into()));
        log::trace!("🔧 Chrome path set to: {}", path);
    }

    builder
        .headless(true)
        .sandbox(false) // required in most containers
        .window_size(Some(settings.window_size))
        .idle_browser_timeout(settings.protocol_timeout)
        .disable_default_args(true)
        .args(vec![
            // ===== Memory and Performance =====
            "--disable-dev-shm-usage".as_ref(),
            "--disable-crash-reporter".as_ref(),
            // ===== GPU and Rendering =====
            "--disable-gpu".as_ref(),
            "--disable-software-rasterizer".as_ref(),
            "--hide-scrollbars".as_ref(),
            "--font-render-hinting=none".as_ref(),
            // ===== Disable Unnecessary Features =====
            "--disable-extensions".as_ref(),
            "--disable-sync".as_ref(),
            "--disable-default-apps".as_ref(),
            "--no-first-run".as_ref(),
            // ===== Stability =====
            "--disable-background-timer-throttling".as_ref(),
            "--disable-backgrounding-occluded-windows".as_ref(),
            "--disable-renderer-backgrounding".as_ref(),
            "--disable-hang-monitor".as_ref(),
            "--disable-ipc-flooding-protection".as_ref(),
        ])
        .build()
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
            log::error!(
                "❌ Failed to build Chrome launch options (path: {}): {}",
                settings.chrome_path.as_deref().unwrap_or("auto-detect"),
                e
            );
            e.into()
        })
}

// ============================================================================
// Process adapter
// ============================================================================

/// A launched Chrome process. Dropping it terminates the child process.
struct ChromeProcess {
    browser: Browser,
}

impl Healthcheck for ChromeProcess {
    fn ping(&self) -> Result<()> {
        self.browser
            .get_version()
            .map(|_| ())
            .map_err(|e| BrowserError::HealthCheckFailed(e.to_string()))
    }
}

impl BrowserProcess for ChromeProcess {
    fn open_page(&self) -> Result<Box<dyn PageSession>> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| BrowserError::PageCreation(e.to_string()))?;
        Ok(Box::new(ChromePage { tab }))
    }

    fn describe(&self) -> String {
        match self.browser.get_version() {
            Ok(version) => version.product,
            Err(_) => "chrome (unreachable)".to_string(),
        }
    }
}

impl Drop for ChromeProcess {
    fn drop(&mut self) {
        log::debug!("🛑 Closing Chrome process (pid: {:?})", self.browser.get_process_id());
    }
}

// ============================================================================
// Page adapter
// ============================================================================

struct ChromePage {
    tab: Arc<Tab>,
}

impl PageSession for ChromePage {
    fn emulate_print_media(&self) -> PageResult<()> {
        self.tab
            .call_method(Emulation::SetEmulatedMedia {
                media: Some("print".to_string()),
                features: None,
            })
            .map(|_| ())
            .map_err(PageError::protocol)
    }

    fn block_resources(&self, policy: Arc<ResourcePolicy>) -> PageResult<()> {
        self.tab
            .enable_fetch(None, None)
            .map_err(PageError::protocol)?;
        self.tab
            .enable_request_interception(Arc::new(PolicyInterceptor { policy }))
            .map_err(PageError::protocol)
    }

    fn set_content(&self, html: &str, timeout: Duration) -> PageResult<()> {
        let started = Instant::now();

        // New tabs sit on about:blank; replacing its document returns once
        // the markup is parsed, leaving sub-resources to the readiness waits.
        self.tab.set_default_timeout(timeout);
        let tree = self
            .tab
            .call_method(Page::GetFrameTree(None))
            .map_err(|e| load_error(e, started, timeout))?;
        self.tab
            .call_method(document_content(tree.frame_tree.frame.id, html))
            .map_err(|e| load_error(e, started, timeout))?;

        if started.elapsed() > timeout {
            return Err(PageError::Timeout(timeout));
        }
        Ok(())
    }

    fn evaluate_bool(&self, script: &str, await_promise: bool) -> PageResult<bool> {
        self.tab
            .evaluate(script, await_promise)
            .map(|result| result.value.and_then(|v| v.as_bool()).unwrap_or(false))
            .map_err(PageError::protocol)
    }

    fn print_pdf(&self, options: &PdfOptions) -> PageResult<Vec<u8>> {
        self.tab
            .print_to_pdf(Some(build_print_options(options)))
            .map_err(PageError::protocol)
    }

    fn close(&self) -> PageResult<()> {
        self.tab.close(true).map(|_| ()).map_err(PageError::protocol)
    }
}

fn load_error(error: impl std::fmt::Display, started: Instant, timeout: Duration) -> PageError {
    if started.elapsed() >= timeout {
        PageError::Timeout(timeout)
    } else {
        PageError::protocol(error)
    }
}

/// `Page.setDocumentContent` for the main frame. The markup is sent as is.
fn document_content(frame_id: String, html: &str) -> Page::SetDocumentContent {
    Page::SetDocumentContent {
        frame_id,
        html: html.to_string(),
    }
}

/// Build `Page.printToPDF` parameters.
///
/// - Background graphics on
/// - `preferCSSPageSize` on, so an `@page { size }` rule wins
/// - Fallback paper size from the requested format
/// - Zero margins, no header/footer
fn build_print_options(options: &PdfOptions) -> PrintToPdfOptions {
    let (width, height) = options.format.inches();
    PrintToPdfOptions {
        landscape: Some(options.landscape),
        display_header_footer: Some(false),
        print_background: Some(true),
        prefer_css_page_size: Some(true),
        paper_width: Some(width),
        paper_height: Some(height),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        ..Default::default()
    }
}

// ============================================================================
// Request interception
// ============================================================================

/// Applies a [`ResourcePolicy`] to every paused request.
struct PolicyInterceptor {
    policy: Arc<ResourcePolicy>,
}

impl RequestInterceptor for PolicyInterceptor {
    fn intercept(
        &self,
        _transport: Arc<Transport>,
        _session_id: SessionId,
        event: RequestPausedEvent,
    ) -> RequestPausedDecision {
        let params = event.params;
        let request = ResourceRequest {
            url: &params.request.url,
            kind: resource_kind(&params.resource_Type),
        };

        if self.policy.allows(&request) {
            RequestPausedDecision::Continue(None)
        } else {
            log::debug!("🚫 Blocked {:?} request: {}", request.kind, truncate(request.url, 120));
            RequestPausedDecision::Fail(FailRequest {
                request_id: params.request_id,
                error_reason: ErrorReason::BlockedByClient,
            })
        }
    }
}

fn resource_kind(resource_type: &ResourceType) -> ResourceKind {
    match resource_type {
        ResourceType::Document => ResourceKind::Document,
        ResourceType::Stylesheet => ResourceKind::Stylesheet,
        ResourceType::Image => ResourceKind::Image,
        ResourceType::Media => ResourceKind::Media,
        ResourceType::Font => ResourceKind::Font,
        ResourceType::Script => ResourceKind::Script,
        _ => ResourceKind::Other,
    }
}

fn truncate(text: &str, max_len: usize) -> &str {
    match text.char_indices().nth(max_len) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies that the factory can be constructed without launching Chrome.
    #[test]
    fn test_chrome_factory_creation() {
        let _factory = ChromeBrowserFactory::with_defaults();
        let _factory_with_path = ChromeBrowserFactory::with_path("/custom/chrome/path".to_string());
    }

    /// Verifies that launch options build for both auto-detect and custom paths.
    #[test]
    fn test_create_chrome_options() {
        let result = create_chrome_options(&LaunchSettings::default());
        assert!(result.is_ok(), "Auto-detect options should build: {:?}", result.err());

        let settings = LaunchSettings {
            chrome_path: Some("/custom/chrome/path".to_string()),
            window_size: (1000, 1400),
            protocol_timeout: Duration::from_secs(5),
        };
        let options = create_chrome_options(&settings).unwrap();
        assert_eq!(options.window_size, Some((1000, 1400)));
        assert_eq!(options.idle_browser_timeout, Duration::from_secs(5));
    }

    /// Verifies the print parameters: background, CSS page size, zero margins.
    #[test]
    fn test_build_print_options() {
        let options = build_print_options(&PdfOptions {
            format: PaperFormat::A4,
            landscape: false,
        });

        assert_eq!(options.print_background, Some(true));
        assert_eq!(options.prefer_css_page_size, Some(true));
        assert_eq!(options.display_header_footer, Some(false));
        assert_eq!(options.landscape, Some(false));
        assert_eq!(options.paper_width, Some(8.27));
        assert_eq!(options.paper_height, Some(11.69));
        assert_eq!(options.margin_top, Some(0.0));
        assert_eq!(options.margin_bottom, Some(0.0));
        assert_eq!(options.margin_left, Some(0.0));
        assert_eq!(options.margin_right, Some(0.0));
    }

    #[test]
    fn test_build_print_options_landscape_letter() {
        let options = build_print_options(&PdfOptions {
            format: PaperFormat::Letter,
            landscape: true,
        });
        assert_eq!(options.landscape, Some(true));
        assert_eq!(options.paper_width, Some(8.5));
        assert_eq!(options.paper_height, Some(11.0));
    }

    #[test]
    fn test_resource_kind_mapping() {
        assert_eq!(resource_kind(&ResourceType::Script), ResourceKind::Script);
        assert_eq!(resource_kind(&ResourceType::Font), ResourceKind::Font);
        assert_eq!(resource_kind(&ResourceType::Document), ResourceKind::Document);
        assert_eq!(resource_kind(&ResourceType::Other), ResourceKind::Other);
    }

    /// Verifies that markup reaches the page verbatim, without URL encoding.
    #[test]
    fn test_document_content_is_not_encoded() {
        let html = "<!DOCTYPE html><p class=\"a b\">100% <b>ok</b></p>";
        let command = document_content("main".to_string(), html);
        assert_eq!(command.frame_id, "main");
        assert_eq!(command.html, html);
    }

    #[test]
    fn test_load_error_classification() {
        let long_ago = Instant::now() - Duration::from_secs(2);
        assert_eq!(
            load_error("Navigation timed out", long_ago, Duration::from_secs(1)),
            PageError::Timeout(Duration::from_secs(1))
        );
        assert_eq!(
            load_error("No frame", Instant::now(), Duration::from_secs(1)),
            PageError::Protocol("No frame".to_string())
        );
    }

    /// Verifies that sub-resources that never answer do not hold up the
    /// content load or the DOM-ready wait.
    #[test]
    #[ignore = "requires a Chrome/Chromium binary"]
    fn test_hanging_subresources_do_not_block_dom_ready() {
        use std::net::TcpListener;

        use crate::BrowserManager;
        use crate::service::RenderWorker;

        // Accepts connections and never answers them.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });

        let manager = BrowserManager::builder()
            .factory(Box::new(ChromeBrowserFactory::with_defaults()))
            .enable_keep_alive(false)
            .build()
            .unwrap();
        let browser = manager.acquire().unwrap();

        let html = format!(
            "<!DOCTYPE html><html><body><h1>Hello</h1>\
             <script async src=\"http://{0}/a.js\"></script>\
             <script async src=\"http://{0}/b.js\"></script>\
             <script async src=\"http://{0}/c.js\"></script></body></html>",
            address
        );

        let started = Instant::now();
        let pdf = RenderWorker::new(Duration::from_secs(5), Duration::from_secs(5))
            .render(
                &browser,
                &html,
                &PdfOptions::default(),
                Instant::now() + Duration::from_secs(30),
            )
            .unwrap();

        assert!(pdf.starts_with(b"%PDF-"));
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ááááá", 2), "áá");
    }
}
