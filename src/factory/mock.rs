//! In-memory browser engine for testing.
//!
//! [`MockBrowserFactory`] launches [`MockBrowserProcess`]es whose pages
//! "render" instantly into a tiny valid-looking PDF. Behaviour can be tuned
//! through [`MockBehavior`] (before or after the factory has been moved into
//! a manager, via [`MockControl`]), and everything the engine does is counted
//! in [`MockProbes`].
//!
//! # Feature Flag
//!
//! This module is only available when:
//! - The `test-utils` feature is enabled, OR
//! - During testing (`#[cfg(test)]`)
//!
//! # Example
//!
//! ```rust,ignore
//! use gerar_pdf_api::factory::mock::MockBrowserFactory;
//!
//! // Factory that always fails
//! let factory = MockBrowserFactory::always_fails("Chrome not installed");
//!
//! // Factory whose pages take 200ms to export
//! let factory = MockBrowserFactory::new();
//! factory.control().update(|b| b.export_delay = Duration::from_millis(200));
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use super::BrowserFactory;
use crate::error::{BrowserError, PageError, PageResult, Result};
use crate::service::{PdfOptions, ResourcePolicy};
use crate::traits::{BrowserProcess, Healthcheck, PageSession};

/// Bytes returned by every successful mock export.
pub const MOCK_PDF: &[u8] =
    b"%PDF-1.7\n%mock\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n";

/// Tunable behaviour of the mock engine.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// When set, every launch fails with this message.
    pub launch_error: Option<String>,

    /// Simulated navigation time. Exceeding the navigation timeout yields
    /// [`PageError::Timeout`].
    pub load_delay: Duration,

    /// Simulated PDF export time.
    pub export_delay: Duration,

    /// Readiness scripts always evaluate to `false`.
    pub never_ready: bool,

    /// Scripts containing this text evaluate to `false`, as if the page
    /// never got there. Other scripts evaluate to `true`.
    pub stall_scripts_containing: Option<String>,

    /// The next N exports kill the browser process mid-render.
    pub crash_next_exports: usize,

    /// Every export fails with a protocol error (browser stays alive).
    pub fail_export: bool,

    /// Exports return bytes that are not a PDF.
    pub corrupt_output: bool,
}

/// Counters describing what the mock engine has done.
#[derive(Debug, Default)]
pub struct MockProbes {
    /// Number of launch attempts (successful or not).
    pub launches: AtomicUsize,
    /// Number of processes dropped (closed).
    pub processes_closed: AtomicUsize,
    /// Pages opened so far.
    pub pages_opened: AtomicUsize,
    /// Pages closed so far.
    pub pages_closed: AtomicUsize,
    /// Pages currently open.
    pub open_pages: AtomicUsize,
    /// Highest number of simultaneously open pages observed.
    pub peak_open_pages: AtomicUsize,
    /// Interception policies installed.
    pub interceptions: AtomicUsize,
    /// Last HTML document loaded into any page.
    pub last_document: Mutex<Option<String>>,
    /// Every script evaluated, in order.
    pub evaluated_scripts: Mutex<Vec<String>>,
}

impl MockProbes {
    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Number of launch attempts.
    pub fn launches(&self) -> usize {
        Self::count(&self.launches)
    }

    /// Number of processes closed.
    pub fn processes_closed(&self) -> usize {
        Self::count(&self.processes_closed)
    }

    /// Pages opened so far.
    pub fn pages_opened(&self) -> usize {
        Self::count(&self.pages_opened)
    }

    /// Pages closed so far.
    pub fn pages_closed(&self) -> usize {
        Self::count(&self.pages_closed)
    }

    /// Pages currently open.
    pub fn open_pages(&self) -> usize {
        Self::count(&self.open_pages)
    }

    /// Highest number of simultaneously open pages.
    pub fn peak_open_pages(&self) -> usize {
        Self::count(&self.peak_open_pages)
    }

    /// Interception policies installed.
    pub fn interceptions(&self) -> usize {
        Self::count(&self.interceptions)
    }

    /// Last HTML document handed to `set_content`.
    pub fn last_document(&self) -> Option<String> {
        self.last_document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Scripts evaluated so far, in order.
    pub fn evaluated_scripts(&self) -> Vec<String> {
        self.evaluated_scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Shared handle to a factory's [`MockBehavior`].
#[derive(Clone, Default)]
pub struct MockControl {
    behavior: Arc<Mutex<MockBehavior>>,
    processes: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl MockControl {
    /// Mutate the behaviour in place.
    pub fn update(&self, f: impl FnOnce(&mut MockBehavior)) {
        f(&mut self.behavior.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Snapshot of the current behaviour.
    pub fn behavior(&self) -> MockBehavior {
        self.behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Kill every process launched so far, as if Chrome had crashed.
    pub fn kill_all(&self) {
        for alive in self.processes.lock().unwrap_or_else(PoisonError::into_inner).iter() {
            alive.store(false, Ordering::SeqCst);
        }
    }

    fn take_crash(&self) -> bool {
        let mut behavior = self.behavior.lock().unwrap_or_else(PoisonError::into_inner);
        if behavior.crash_next_exports > 0 {
            behavior.crash_next_exports -= 1;
            true
        } else {
            false
        }
    }
}

/// Mock browser factory for testing without Chrome.
///
/// # Example
///
/// ```rust,ignore
/// let factory = MockBrowserFactory::new();
/// let probes = factory.probes();
/// let manager = BrowserManager::builder().factory(Box::new(factory)).build()?;
/// // ...
/// assert_eq!(probes.launches(), 1);
/// ```
#[derive(Default)]
pub struct MockBrowserFactory {
    control: MockControl,
    probes: Arc<MockProbes>,
}

impl MockBrowserFactory {
    /// Create a factory whose browsers render successfully.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory with explicit behaviour.
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        let factory = Self::new();
        factory.control.update(|b| *b = behavior);
        factory
    }

    /// Create a factory that always fails to launch with the given message.
    pub fn always_fails<S: Into<String>>(message: S) -> Self {
        Self::with_behavior(MockBehavior {
            launch_error: Some(message.into()),
            ..MockBehavior::default()
        })
    }

    /// Handle for changing behaviour after the factory has been moved.
    pub fn control(&self) -> MockControl {
        self.control.clone()
    }

    /// Counters shared with every process and page this factory creates.
    pub fn probes(&self) -> Arc<MockProbes> {
        Arc::clone(&self.probes)
    }
}

impl BrowserFactory for MockBrowserFactory {
    fn create(&self) -> Result<Box<dyn BrowserProcess>> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        self.probes.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.control.behavior().launch_error {
            log::debug!("🧪 Mock launch failing: {}", message);
            return Err(BrowserError::Launch(message));
        }

        let alive = Arc::new(AtomicBool::new(true));
        self.control
            .processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&alive));

        Ok(Box::new(MockBrowserProcess {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            alive,
            control: self.control.clone(),
            probes: Arc::clone(&self.probes),
        }))
    }
}

/// Process launched by [`MockBrowserFactory`].
pub struct MockBrowserProcess {
    id: u64,
    alive: Arc<AtomicBool>,
    control: MockControl,
    probes: Arc<MockProbes>,
}

impl Healthcheck for MockBrowserProcess {
    fn ping(&self) -> Result<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrowserError::HealthCheckFailed(format!(
                "mock browser {} is gone",
                self.id
            )))
        }
    }
}

impl BrowserProcess for MockBrowserProcess {
    fn open_page(&self) -> Result<Box<dyn PageSession>> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(BrowserError::Crashed(format!("mock browser {} is gone", self.id)));
        }

        self.probes.pages_opened.fetch_add(1, Ordering::SeqCst);
        let open = self.probes.open_pages.fetch_add(1, Ordering::SeqCst) + 1;
        self.probes.peak_open_pages.fetch_max(open, Ordering::SeqCst);

        Ok(Box::new(MockPage {
            alive: Arc::clone(&self.alive),
            control: self.control.clone(),
            probes: Arc::clone(&self.probes),
        }))
    }

    fn describe(&self) -> String {
        format!("mock-browser/{}", self.id)
    }
}

impl Drop for MockBrowserProcess {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.probes.processes_closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockPage {
    alive: Arc<AtomicBool>,
    control: MockControl,
    probes: Arc<MockProbes>,
}

impl MockPage {
    fn ensure_alive(&self) -> PageResult<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PageError::Protocol("connection closed".to_string()))
        }
    }
}

impl PageSession for MockPage {
    fn emulate_print_media(&self) -> PageResult<()> {
        self.ensure_alive()
    }

    fn block_resources(&self, _policy: Arc<ResourcePolicy>) -> PageResult<()> {
        self.ensure_alive()?;
        self.probes.interceptions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_content(&self, html: &str, timeout: Duration) -> PageResult<()> {
        self.ensure_alive()?;
        *self
            .probes
            .last_document
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(html.to_string());

        let delay = self.control.behavior().load_delay;
        if delay > timeout {
            thread::sleep(timeout);
            return Err(PageError::Timeout(timeout));
        }
        thread::sleep(delay);
        self.ensure_alive()
    }

    fn evaluate_bool(&self, script: &str, _await_promise: bool) -> PageResult<bool> {
        self.ensure_alive()?;
        self.probes
            .evaluated_scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(script.to_string());

        let behavior = self.control.behavior();
        let stalled = behavior
            .stall_scripts_containing
            .as_deref()
            .is_some_and(|marker| script.contains(marker));
        Ok(!behavior.never_ready && !stalled)
    }

    fn print_pdf(&self, _options: &PdfOptions) -> PageResult<Vec<u8>> {
        self.ensure_alive()?;
        let behavior = self.control.behavior();
        thread::sleep(behavior.export_delay);

        if self.control.take_crash() {
            self.alive.store(false, Ordering::SeqCst);
            return Err(PageError::Protocol("connection closed".to_string()));
        }
        if behavior.fail_export {
            return Err(PageError::Protocol("Printing failed".to_string()));
        }
        if behavior.corrupt_output {
            return Ok(b"<html>not a pdf</html>".to_vec());
        }
        Ok(MOCK_PDF.to_vec())
    }

    fn close(&self) -> PageResult<()> {
        self.probes.open_pages.fetch_sub(1, Ordering::SeqCst);
        self.probes.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
