//! Health check trait for browser instances.
//!
//! The keep-alive thread of the [`BrowserManager`](crate::BrowserManager)
//! pings the cached browser at a fixed interval. After too many consecutive
//! failures the browser is treated as disconnected and discarded, so the next
//! render relaunches it.

use crate::error::Result;

/// Trait for browser-like objects that support health checking.
///
/// # Thread Safety
///
/// Requires `Send + Sync` because the browser is pinged from the keep-alive
/// thread while render workers use it from blocking worker threads.
///
/// # How It's Used
///
/// ```text
/// Keep-Alive Thread
///       │
///       ├─── ping() ──→ browser ──→ ✓ OK (failure count reset)
///       │
///       ├─── ping() ──→ browser ──→ ✗ Failed (count: 1)
///       │
///       └─── ping() ──→ browser ──→ ✗ Failed (count: max) ──→ invalidate()
/// ```
pub trait Healthcheck: Send + Sync {
    /// Perform a lightweight liveness probe.
    ///
    /// Must not hold locks while doing I/O and must be safe to call
    /// repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::HealthCheckFailed`](crate::BrowserError::HealthCheckFailed)
    /// if the browser does not answer.
    fn ping(&self) -> Result<()>;
}
