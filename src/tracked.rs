//! Tracked browser with lifecycle metadata.
//!
//! [`TrackedBrowser`] wraps the launched [`BrowserProcess`] with:
//! - **Unique ID**: lets stale invalidations (from a render that started on a
//!   previous browser) be ignored
//! - **Creation time**: reported in stats and logs
//! - **Last ping time**: updated on every successful health check
//!
//! # Architecture
//!
//! ```text
//! TrackedBrowser
//! ├── id: u64 (unique identifier)
//! ├── process: Arc<dyn BrowserProcess> (shared ownership)
//! ├── last_ping: Arc<Mutex<Instant>> (health tracking)
//! └── created_at: Instant
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{BrowserError, Result};
use crate::traits::{BrowserProcess, Healthcheck};

/// A launched browser with metadata for lifecycle management.
///
/// Cheap to clone: the lifecycle manager keeps one copy in its `Ready` state
/// and every [`BrowserHandle`](crate::BrowserHandle) holds another. The
/// underlying process is closed when the last copy is dropped.
#[derive(Clone)]
pub(crate) struct TrackedBrowser {
    /// Globally unique identifier, assigned sequentially.
    id: u64,

    /// The running process.
    process: Arc<dyn BrowserProcess>,

    /// Timestamp of last successful health check.
    last_ping: Arc<Mutex<Instant>>,

    /// Launch timestamp.
    created_at: Instant,
}

impl TrackedBrowser {
    /// Wrap a freshly launched process after checking it answers.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Launch`] if the initial ping fails, i.e. the
    /// process started but its DevTools endpoint is not usable.
    pub(crate) fn new(process: Box<dyn BrowserProcess>) -> Result<Self> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        process.ping().map_err(|e| {
            log::error!("❌ Browser validation failed: {}", e);
            BrowserError::Launch(e.to_string())
        })?;

        Ok(TrackedBrowser {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            process: Arc::from(process),
            last_ping: Arc::new(Mutex::new(Instant::now())),
            created_at: Instant::now(),
        })
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn process(&self) -> &Arc<dyn BrowserProcess> {
        &self.process
    }

    #[inline]
    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the last successful ping.
    pub(crate) fn since_last_ping(&self) -> Duration {
        self.last_ping
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

impl Healthcheck for TrackedBrowser {
    fn ping(&self) -> Result<()> {
        log::trace!("🏓 Pinging browser {}...", self.id);

        self.process.ping().inspect_err(|e| {
            log::warn!("⚠️ Browser {} ping failed: {}", self.id, e);
        })?;

        *self.last_ping.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
        Ok(())
    }
}

impl std::fmt::Debug for TrackedBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedBrowser")
            .field("id", &self.id)
            .field("age", &self.age())
            .field("since_last_ping", &self.since_last_ping())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::BrowserFactory;
    use crate::factory::mock::MockBrowserFactory;

    #[test]
    fn test_tracked_ids_are_unique() {
        let factory = MockBrowserFactory::new();
        let a = TrackedBrowser::new(factory.create().unwrap()).unwrap();
        let b = TrackedBrowser::new(factory.create().unwrap()).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.age() < Duration::from_secs(5));
    }

    /// Verifies that a dead process is rejected at construction time.
    #[test]
    fn test_tracked_rejects_dead_process() {
        let factory = MockBrowserFactory::new();
        let control = factory.control();
        let process = factory.create().unwrap();
        control.kill_all();

        match TrackedBrowser::new(process) {
            Err(BrowserError::Launch(_)) => {}
            other => panic!("Expected Launch error, got {:?}", other),
        }
    }

    #[test]
    fn test_ping_updates_timestamp() {
        let factory = MockBrowserFactory::new();
        let tracked = TrackedBrowser::new(factory.create().unwrap()).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert!(tracked.since_last_ping() >= Duration::from_millis(20));

        tracked.ping().unwrap();
        assert!(tracked.since_last_ping() < Duration::from_millis(20));
    }

    /// Verifies that the process closes only when the last clone is dropped.
    #[test]
    fn test_process_closed_with_last_clone() {
        let factory = MockBrowserFactory::new();
        let probes = factory.probes();
        let tracked = TrackedBrowser::new(factory.create().unwrap()).unwrap();
        let copy = tracked.clone();

        drop(tracked);
        assert_eq!(probes.processes_closed(), 0);
        drop(copy);
        assert_eq!(probes.processes_closed(), 1);
    }
}
