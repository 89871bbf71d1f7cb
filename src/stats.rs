//! Service statistics for monitoring.
//!
//! [`ServiceStats`] is what `GET /api/stats` returns: a snapshot of the
//! concurrency gate, the browser lifecycle and the render counters.
//!
//! # Example
//!
//! ```rust,ignore
//! let stats = service.stats();
//! log::info!(
//!     "in flight: {}/{}, queued: {}, browser: {:?}",
//!     stats.gate.in_flight,
//!     stats.gate.max_concurrency,
//!     stats.gate.queued,
//!     stats.browser.status,
//! );
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::manager::BrowserStatus;

/// Snapshot of the concurrency gate.
///
/// Values can change immediately after reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateStats {
    /// Configured maximum of simultaneous renders.
    pub max_concurrency: usize,
    /// Renders currently holding a permit.
    pub in_flight: usize,
    /// Requests waiting for a permit.
    pub queued: usize,
}

/// Snapshot of the browser lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserStats {
    /// Lifecycle state.
    pub status: BrowserStatus,
    /// ID of the cached browser, when ready.
    pub browser_id: Option<u64>,
    /// Seconds since the cached browser was launched.
    pub age_secs: Option<u64>,
    /// Launch attempts since startup (including failed ones).
    pub launches: u64,
    /// Outstanding browser handles.
    pub leases: usize,
}

/// Render outcome counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RenderStats {
    /// Renders that produced a PDF.
    pub completed: u64,
    /// Renders that failed for any reason.
    pub failed: u64,
    /// Failed renders that were timeouts.
    pub timed_out: u64,
}

/// Everything `GET /api/stats` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    /// Concurrency gate.
    pub gate: GateStats,
    /// Browser lifecycle.
    pub browser: BrowserStats,
    /// Render outcomes.
    pub renders: RenderStats,
}

/// Live counters behind [`RenderStats`].
#[derive(Debug, Default)]
pub(crate) struct RenderCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

impl RenderCounters {
    pub(crate) fn record_success(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, timed_out: bool) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.timed_out.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> RenderStats {
        RenderStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_counters() {
        let counters = RenderCounters::default();
        counters.record_success();
        counters.record_failure(false);
        counters.record_failure(true);

        assert_eq!(
            counters.snapshot(),
            RenderStats {
                completed: 1,
                failed: 2,
                timed_out: 1,
            }
        );
    }

    /// Verifies the JSON shape served by the stats endpoint.
    #[test]
    fn test_stats_serialization() {
        let stats = ServiceStats {
            gate: GateStats {
                max_concurrency: 2,
                in_flight: 1,
                queued: 0,
            },
            browser: BrowserStats {
                status: BrowserStatus::Ready,
                browser_id: Some(7),
                age_secs: Some(12),
                launches: 1,
                leases: 1,
            },
            renders: RenderStats::default(),
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["gate"]["max_concurrency"], 2);
        assert_eq!(json["browser"]["status"], "ready");
        assert_eq!(json["browser"]["browser_id"], 7);
        assert_eq!(json["renders"]["completed"], 0);
    }
}
