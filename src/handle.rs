//! Lease on the shared browser process.
//!
//! [`BrowserHandle`] is what [`BrowserManager::acquire()`](crate::BrowserManager::acquire)
//! hands out. Every render task holds one for its duration; all handles
//! point at the same process until that process is invalidated.
//!
//! # Deref Behavior
//!
//! `BrowserHandle` implements [`Deref<Target = dyn BrowserProcess>`](std::ops::Deref),
//! so pages are opened directly on the handle:
//!
//! ```rust,ignore
//! let browser = manager.acquire()?;
//! let page = browser.open_page()?;
//! ```
//!
//! # Crash Reporting
//!
//! A worker that sees the process die calls
//! [`mark_crashed()`](BrowserHandle::mark_crashed). The manager discards the
//! cached browser only if it is still the one this handle points at, so a
//! late report from an old render cannot take down a freshly relaunched
//! browser.

use std::sync::Arc;
use std::time::Duration;

use crate::manager::ManagerInner;
use crate::tracked::TrackedBrowser;
use crate::traits::{BrowserProcess, Healthcheck};

/// Shared lease on the current browser process.
///
/// The lease count is visible in [`BrowserStats`](crate::BrowserStats) and
/// drops when the handle goes out of scope, on every exit path.
pub struct BrowserHandle {
    tracked: TrackedBrowser,
    manager: Arc<ManagerInner>,
}

impl BrowserHandle {
    pub(crate) fn new(tracked: TrackedBrowser, manager: Arc<ManagerInner>) -> Self {
        manager.lease_acquired();
        Self { tracked, manager }
    }

    /// Unique ID of the underlying browser.
    pub fn id(&self) -> u64 {
        self.tracked.id()
    }

    /// Time since the browser was launched.
    pub fn age(&self) -> Duration {
        self.tracked.age()
    }

    /// Probe the process. A failed probe means the browser is gone.
    pub fn is_alive(&self) -> bool {
        self.tracked.ping().is_ok()
    }

    /// Report that the process died so the next acquisition relaunches.
    ///
    /// Returns `true` if this report invalidated the cached browser.
    pub fn mark_crashed(&self, reason: &str) -> bool {
        self.manager.invalidate(self.tracked.id(), reason)
    }
}

impl std::ops::Deref for BrowserHandle {
    type Target = dyn BrowserProcess;

    fn deref(&self) -> &Self::Target {
        self.tracked.process().as_ref()
    }
}

impl Drop for BrowserHandle {
    fn drop(&mut self) {
        log::trace!("🔓 Releasing lease on browser {}", self.tracked.id());
        self.manager.lease_released();
    }
}

impl std::fmt::Debug for BrowserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserHandle")
            .field("id", &self.tracked.id())
            .field("age", &self.tracked.age())
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
