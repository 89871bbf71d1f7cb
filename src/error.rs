//! Error types for the browser lifecycle and page primitives.
//!
//! This module provides two error types:
//!
//! - [`BrowserError`] for everything that concerns the shared browser process
//!   (launch, health, shutdown, configuration), with the [`Result`] alias.
//! - [`PageError`] for the primitive operations of a single page session
//!   (navigation, evaluation, export).
//!
//! Both are translated into the HTTP-facing
//! [`PdfServiceError`](crate::service::PdfServiceError) at the render task
//! boundary.
//!
//! # Example
//!
//! ```rust
//! use gerar_pdf_api::{BrowserError, Result};
//!
//! fn launch() -> Result<()> {
//!     Err(BrowserError::Launch("chrome binary not found".to_string()))
//! }
//!
//! match launch() {
//!     Ok(()) => println!("launched"),
//!     Err(BrowserError::ShuttingDown) => println!("service is stopping"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::time::Duration;

/// Errors raised by the browser lifecycle manager and engine adapters.
///
/// # Example
///
/// ```rust
/// use gerar_pdf_api::BrowserError;
///
/// fn describe(error: &BrowserError) -> &'static str {
///     match error {
///         BrowserError::Launch(_) => "could not start the browser",
///         BrowserError::Crashed(_) => "browser died",
///         BrowserError::PageCreation(_) => "could not open a tab",
///         BrowserError::HealthCheckFailed(_) => "browser unresponsive",
///         BrowserError::ShuttingDown => "stopping",
///         BrowserError::Configuration(_) => "bad settings",
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// The external browser process could not be started.
    ///
    /// # Common Causes
    ///
    /// - Chrome/Chromium binary not found or not installed
    /// - `CHROME_PATH` points at a non-executable file
    /// - Sandbox or namespace restrictions in the container
    /// - System resource limits exceeded
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// The browser process died or its DevTools connection was lost.
    ///
    /// The lifecycle manager discards the cached handle when this happens,
    /// so the next acquisition relaunches.
    #[error("Browser crashed: {0}")]
    Crashed(String),

    /// A new page/tab could not be opened on an otherwise live browser.
    #[error("Failed to open page: {0}")]
    PageCreation(String),

    /// A keep-alive ping did not get an answer.
    #[error("Browser health check failed: {0}")]
    HealthCheckFailed(String),

    /// Operation attempted after [`BrowserManager::shutdown()`](crate::BrowserManager::shutdown).
    ///
    /// Handle it by stopping pending work rather than retrying.
    #[error("Browser manager is shutting down")]
    ShuttingDown,

    /// Invalid configuration provided.
    ///
    /// # Prevention
    ///
    /// Use [`ServiceConfigBuilder`](crate::ServiceConfigBuilder), which
    /// validates configuration at build time.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Convenience conversion from [`String`] to [`BrowserError::Configuration`].
///
/// Lets `?` lift the `String` errors returned by
/// [`ServiceConfigBuilder::build()`](crate::ServiceConfigBuilder::build).
impl From<String> for BrowserError {
    fn from(msg: String) -> Self {
        BrowserError::Configuration(msg)
    }
}

/// Convenience conversion from `&str` to [`BrowserError::Configuration`].
impl From<&str> for BrowserError {
    fn from(msg: &str) -> Self {
        BrowserError::Configuration(msg.to_string())
    }
}

/// Result type alias using [`BrowserError`].
pub type Result<T> = std::result::Result<T, BrowserError>;

/// Failure of a single page primitive.
///
/// Engine adapters only distinguish "took too long" from "the protocol
/// reported an error". Whether a protocol error means the browser crashed is
/// decided by the render worker, which probes the process afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    /// The operation did not finish within its bound.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The DevTools protocol (or the mock engine) reported an error.
    #[error("{0}")]
    Protocol(String),
}

impl PageError {
    /// Wrap any displayable driver error as [`PageError::Protocol`].
    pub fn protocol(err: impl std::fmt::Display) -> Self {
        PageError::Protocol(err.to_string())
    }
}

/// Result type alias for page primitives.
pub type PageResult<T> = std::result::Result<T, PageError>;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies error type conversions from String and &str.
    #[test]
    fn test_error_conversion() {
        let error: BrowserError = "test error".into();
        match error {
            BrowserError::Configuration(msg) => {
                assert_eq!(msg, "test error", "Error message should be preserved");
            }
            _ => panic!("Expected Configuration error variant"),
        }

        let error: BrowserError = "another error".to_string().into();
        assert!(matches!(error, BrowserError::Configuration(ref m) if m == "another error"));
    }

    /// Verifies that error Display formatting works correctly.
    #[test]
    fn test_error_display() {
        let error = BrowserError::Launch("chrome not found".to_string());
        assert_eq!(error.to_string(), "Failed to launch browser: chrome not found");

        let error = BrowserError::Crashed("connection closed".to_string());
        assert_eq!(error.to_string(), "Browser crashed: connection closed");

        let error = BrowserError::ShuttingDown;
        assert_eq!(error.to_string(), "Browser manager is shutting down");

        let error = PageError::Timeout(Duration::from_millis(1500));
        assert_eq!(error.to_string(), "timed out after 1.5s");

        let error = PageError::protocol("Target closed");
        assert_eq!(error, PageError::Protocol("Target closed".to_string()));
    }

    /// Verifies that both error types are thread-safe std errors.
    #[test]
    fn test_errors_are_send_sync_std_errors() {
        fn assert_bounds<T: std::error::Error + Send + Sync + 'static>() {}
        assert_bounds::<BrowserError>();
        assert_bounds::<PageError>();
    }
}
