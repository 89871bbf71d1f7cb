//! Engine abstraction driven by the render worker.

use std::sync::Arc;
use std::time::Duration;

use super::Healthcheck;
use crate::error::{PageResult, Result};
use crate::service::{PdfOptions, ResourcePolicy};

/// A running browser process.
///
/// Shared read-only by every render task; each task opens its own page.
///
/// # Implementors
///
/// - the Chrome adapter created by [`ChromeBrowserFactory`](crate::ChromeBrowserFactory)
/// - `factory::mock::MockBrowserProcess` (with the `test-utils` feature)
pub trait BrowserProcess: Healthcheck {
    /// Open a new isolated page/tab.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::PageCreation`](crate::BrowserError::PageCreation)
    /// or [`BrowserError::Crashed`](crate::BrowserError::Crashed).
    fn open_page(&self) -> Result<Box<dyn PageSession>>;

    /// Short description for logs (browser version, mock id, ...).
    fn describe(&self) -> String {
        "browser".to_string()
    }
}

/// Primitive operations on one page.
///
/// Pages are owned by exactly one render task, so the trait only requires
/// `Send`. Every method is blocking.
pub trait PageSession: Send {
    /// Switch the emulated CSS media type to `print`.
    fn emulate_print_media(&self) -> PageResult<()>;

    /// Start denying sub-resource requests rejected by `policy`.
    ///
    /// Only called when [`ResourcePolicy::is_active()`] is true.
    fn block_resources(&self, policy: Arc<ResourcePolicy>) -> PageResult<()>;

    /// Load `html` as the page document and wait for the navigation to
    /// commit, for at most `timeout`.
    fn set_content(&self, html: &str, timeout: Duration) -> PageResult<()>;

    /// Evaluate a script that produces a boolean.
    ///
    /// With `await_promise` the script may return a promise resolving to a
    /// boolean. Non-boolean results read as `false`.
    fn evaluate_bool(&self, script: &str, await_promise: bool) -> PageResult<bool>;

    /// Print the current document to PDF.
    fn print_pdf(&self, options: &PdfOptions) -> PageResult<Vec<u8>>;

    /// Close the page. Called exactly once, from the worker's page guard.
    fn close(&self) -> PageResult<()>;
}
