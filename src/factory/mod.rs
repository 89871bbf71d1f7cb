//! Browser factory implementations.
//!
//! This module provides the [`BrowserFactory`] trait, which the
//! [`BrowserManager`](crate::BrowserManager) calls whenever it needs to
//! (re)launch the shared browser process.
//!
//! # Available Factories
//!
//! | Factory | Description |
//! |---------|-------------|
//! | [`ChromeBrowserFactory`] | Launches headless Chrome/Chromium |
//! | `mock::MockBrowserFactory` | In-memory engine for tests (feature-gated) |
//!
//! # Example
//!
//! ```rust,ignore
//! use gerar_pdf_api::{BrowserFactory, ChromeBrowserFactory};
//!
//! let factory = ChromeBrowserFactory::with_defaults();
//! let browser = factory.create()?;
//! let page = browser.open_page()?;
//! ```

mod chrome;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use chrome::{ChromeBrowserFactory, LaunchSettings, create_chrome_options};

use crate::error::Result;
use crate::traits::BrowserProcess;

/// Trait for browser factory pattern.
///
/// # Thread Safety
///
/// Requires `Send + Sync` because the factory is owned by the lifecycle
/// manager and invoked from whichever blocking thread triggers a launch.
pub trait BrowserFactory: Send + Sync {
    /// Launch a new browser process.
    ///
    /// # Errors
    ///
    /// - [`BrowserError::Configuration`](crate::BrowserError::Configuration) -
    ///   invalid launch options
    /// - [`BrowserError::Launch`](crate::BrowserError::Launch) -
    ///   binary not found, launch fails, etc.
    fn create(&self) -> Result<Box<dyn BrowserProcess>>;
}
