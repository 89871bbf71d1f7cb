//! Browser lifecycle manager.
//!
//! [`BrowserManager`] owns the single shared browser process. It launches it
//! lazily, hands out [`BrowserHandle`]s, relaunches after a crash or
//! disconnect, and closes it exactly once at shutdown.
//!
//! # State Machine
//!
//! ```text
//!              acquire()                 launch ok
//!   Absent ───────────────▶ Launching ───────────────▶ Ready
//!     ▲                        │                        │
//!     │      launch failed     │                        │ invalidate() /
//!     └────────────────────────┘                        │ keep-alive failures
//!                                                       ▼
//!                          acquire() relaunches ◀──── Dead
//!
//!   any state ── shutdown() ──▶ Closed (terminal)
//! ```
//!
//! The state lives behind a [`Mutex`] and a [`Condvar`]:
//! - Only the caller that moves `Absent`/`Dead` to `Launching` launches.
//! - Callers arriving while `Launching` wait on the condvar instead of
//!   starting a second process.
//! - The launch itself happens without holding the lock.
//!
//! # Keep-Alive
//!
//! A background thread pings the cached browser every `ping_interval` and
//! invalidates it after `max_ping_failures` consecutive failures. It waits on
//! a condvar instead of sleeping, so shutdown wakes it immediately.
//!
//! # Blocking
//!
//! [`acquire()`](BrowserManager::acquire) blocks (it may launch Chrome). Call
//! it from `spawn_blocking`, as the render service does, or use
//! [`warmup()`](BrowserManager::warmup) from async code.
//!
//! # Example
//!
//! ```rust,ignore
//! use gerar_pdf_api::{BrowserManager, ChromeBrowserFactory};
//!
//! let manager = BrowserManager::builder()
//!     .factory(Box::new(ChromeBrowserFactory::with_defaults()))
//!     .build()?;
//!
//! let browser = manager.acquire()?;
//! let page = browser.open_page()?;
//! // ...
//! manager.shutdown();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{BrowserError, Result};
use crate::factory::BrowserFactory;
use crate::handle::BrowserHandle;
use crate::stats::BrowserStats;
use crate::tracked::TrackedBrowser;
use crate::traits::Healthcheck;

/// Observable lifecycle state of the shared browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserStatus {
    /// Never launched, or the last launch failed.
    Absent,
    /// A launch is in progress.
    Launching,
    /// A live browser is cached.
    Ready,
    /// The cached browser was invalidated; the next acquisition relaunches.
    Dead,
    /// Shut down; no further launches.
    Closed,
}

enum BrowserState {
    Absent,
    Launching,
    Ready(TrackedBrowser),
    Dead,
    Closed,
}

impl BrowserState {
    fn status(&self) -> BrowserStatus {
        match self {
            BrowserState::Absent => BrowserStatus::Absent,
            BrowserState::Launching => BrowserStatus::Launching,
            BrowserState::Ready(_) => BrowserStatus::Ready,
            BrowserState::Dead => BrowserStatus::Dead,
            BrowserState::Closed => BrowserStatus::Closed,
        }
    }
}

// ============================================================================
// ManagerInner
// ============================================================================

/// Shared state of the manager.
///
/// Held by the [`BrowserManager`], every [`BrowserHandle`] and the keep-alive
/// thread.
pub(crate) struct ManagerInner {
    factory: Box<dyn BrowserFactory>,
    state: Mutex<BrowserState>,
    state_changed: Condvar,
    launches: AtomicU64,
    leases: AtomicUsize,
    shutting_down: AtomicBool,
    shutdown_signal: Arc<(Mutex<bool>, Condvar)>,
}

impl ManagerInner {
    fn new(factory: Box<dyn BrowserFactory>) -> Arc<Self> {
        Arc::new(Self {
            factory,
            state: Mutex::new(BrowserState::Absent),
            state_changed: Condvar::new(),
            launches: AtomicU64::new(0),
            leases: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
            shutdown_signal: Arc::new((Mutex::new(false), Condvar::new())),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, BrowserState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return a handle to the cached browser, launching one if needed.
    fn acquire(self: &Arc<Self>) -> Result<BrowserHandle> {
        let mut state = self.lock_state();
        loop {
            match &*state {
                BrowserState::Closed => return Err(BrowserError::ShuttingDown),
                BrowserState::Launching => {
                    log::trace!("⏳ Waiting for in-progress browser launch");
                    state = self
                        .state_changed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                BrowserState::Ready(tracked) => {
                    let tracked = tracked.clone();
                    drop(state);

                    // Probe outside the lock; a browser that died while idle
                    // is replaced here instead of failing the request.
                    if tracked.ping().is_ok() {
                        return Ok(BrowserHandle::new(tracked, Arc::clone(self)));
                    }
                    self.invalidate(tracked.id(), "found dead on acquire");
                    drop(tracked);
                    state = self.lock_state();
                }
                BrowserState::Absent | BrowserState::Dead => {
                    *state = BrowserState::Launching;
                    drop(state);
                    let tracked = self.launch()?;
                    return Ok(BrowserHandle::new(tracked, Arc::clone(self)));
                }
            }
        }
    }

    /// Launch a browser. Must only be called by the thread that moved the
    /// state to `Launching`.
    fn launch(&self) -> Result<TrackedBrowser> {
        let mut guard = LaunchGuard {
            inner: self,
            armed: true,
        };

        let attempt = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        log::info!("🚀 Launching browser (launch #{})...", attempt);

        let result = self.factory.create().and_then(TrackedBrowser::new);

        let mut state = self.lock_state();
        guard.armed = false;

        let outcome = match result {
            Ok(tracked) if matches!(*state, BrowserState::Closed) => {
                log::warn!("⚠️ Browser {} launched during shutdown, discarding", tracked.id());
                Err(BrowserError::ShuttingDown)
            }
            Ok(tracked) => {
                log::info!(
                    "✅ Browser {} ready in {:?} ({})",
                    tracked.id(),
                    started.elapsed(),
                    tracked.process().describe()
                );
                *state = BrowserState::Ready(tracked.clone());
                Ok(tracked)
            }
            Err(e) => {
                log::error!(
                    "❌ Browser launch #{} failed after {:?}: {}",
                    attempt,
                    started.elapsed(),
                    e
                );
                if !matches!(*state, BrowserState::Closed) {
                    *state = BrowserState::Absent;
                }
                Err(e)
            }
        };

        self.state_changed.notify_all();
        outcome
    }

    /// Discard the cached browser if it is still browser `id`.
    pub(crate) fn invalidate(&self, id: u64, reason: &str) -> bool {
        let mut state = self.lock_state();
        let previous = match &*state {
            BrowserState::Ready(tracked) if tracked.id() == id => {
                std::mem::replace(&mut *state, BrowserState::Dead)
            }
            _ => return false,
        };
        drop(state);

        log::warn!("💀 Browser {} invalidated: {} (next request relaunches)", id, reason);
        // Process closes here unless in-flight renders still hold it.
        drop(previous);
        true
    }

    fn snapshot(&self) -> Option<TrackedBrowser> {
        match &*self.lock_state() {
            BrowserState::Ready(tracked) => Some(tracked.clone()),
            _ => None,
        }
    }

    /// Move to `Closed`. Returns `false` if already closed.
    fn close(&self) -> bool {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return false;
        }

        {
            let (lock, cvar) = &*self.shutdown_signal;
            *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
            cvar.notify_all();
        }

        let previous = {
            let mut state = self.lock_state();
            let previous = std::mem::replace(&mut *state, BrowserState::Closed);
            self.state_changed.notify_all();
            previous
        };

        match previous {
            BrowserState::Ready(tracked) => {
                log::info!(
                    "🛑 Closing browser {} (age: {:?}, leases: {})",
                    tracked.id(),
                    tracked.age(),
                    self.leases.load(Ordering::SeqCst)
                );
            }
            _ => log::debug!("No browser to close"),
        }
        true
    }

    pub(crate) fn lease_acquired(&self) {
        self.leases.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn lease_released(&self) {
        self.leases.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Restores `Absent` if a launch unwinds before recording its outcome.
struct LaunchGuard<'a> {
    inner: &'a ManagerInner,
    armed: bool,
}

impl Drop for LaunchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.inner.lock_state();
            if matches!(*state, BrowserState::Launching) {
                *state = BrowserState::Absent;
            }
            self.inner.state_changed.notify_all();
        }
    }
}

// ============================================================================
// BrowserManager
// ============================================================================

/// Owner of the shared browser process.
///
/// # Thread Safety
///
/// `Send + Sync`; share it behind an [`Arc`].
///
/// # Shutdown
///
/// [`shutdown()`](Self::shutdown) is idempotent and also runs on `Drop`.
pub struct BrowserManager {
    inner: Arc<ManagerInner>,
    keep_alive_handle: Mutex<Option<JoinHandle<()>>>,
}

impl BrowserManager {
    /// Create a builder.
    pub fn builder() -> BrowserManagerBuilder {
        BrowserManagerBuilder::new()
    }

    /// Get a handle to the live browser, launching it if necessary.
    ///
    /// Blocking. Concurrent callers during a launch wait for that launch
    /// instead of starting another process.
    ///
    /// # Errors
    ///
    /// - [`BrowserError::Launch`] if the process cannot start
    /// - [`BrowserError::ShuttingDown`] after [`shutdown()`](Self::shutdown)
    pub fn acquire(&self) -> Result<BrowserHandle> {
        self.inner.acquire()
    }

    /// Launch the browser ahead of the first request.
    ///
    /// # Errors
    ///
    /// Same as [`acquire()`](Self::acquire).
    pub async fn warmup(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        log::info!("🔥 Warming up browser...");
        tokio::task::spawn_blocking(move || inner.acquire().map(drop))
            .await
            .map_err(|e| BrowserError::Launch(format!("warmup task failed: {}", e)))?
    }

    /// Discard browser `id` if it is still the cached one.
    pub fn invalidate(&self, id: u64, reason: &str) -> bool {
        self.inner.invalidate(id, reason)
    }

    /// Current lifecycle state.
    pub fn status(&self) -> BrowserStatus {
        self.inner.lock_state().status()
    }

    /// ID of the cached browser, if one is ready.
    pub fn current_browser_id(&self) -> Option<u64> {
        self.inner.snapshot().map(|tracked| tracked.id())
    }

    /// Number of launch attempts so far.
    pub fn launch_count(&self) -> u64 {
        self.inner.launches.load(Ordering::SeqCst)
    }

    /// Number of outstanding [`BrowserHandle`]s.
    pub fn lease_count(&self) -> usize {
        self.inner.leases.load(Ordering::SeqCst)
    }

    /// `true` once [`shutdown()`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// Snapshot for the stats endpoint.
    pub fn stats(&self) -> BrowserStats {
        let state = self.inner.lock_state();
        let (browser_id, age_secs) = match &*state {
            BrowserState::Ready(tracked) => (Some(tracked.id()), Some(tracked.age().as_secs())),
            _ => (None, None),
        };
        BrowserStats {
            status: state.status(),
            browser_id,
            age_secs,
            launches: self.launch_count(),
            leases: self.lease_count(),
        }
    }

    /// Close the browser and stop monitoring. Safe to call repeatedly and
    /// when no browser was ever launched.
    pub fn shutdown(&self) {
        if !self.inner.close() {
            log::debug!("Browser manager already shut down");
            return;
        }

        let handle = self
            .keep_alive_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            match handle.join() {
                Ok(()) => log::debug!("Keep-alive thread stopped"),
                Err(_) => log::error!("❌ Keep-alive thread panicked"),
            }
        }

        log::info!(
            "✅ Browser manager shut down ({} launches over its lifetime)",
            self.launch_count()
        );
    }

    fn start_keep_alive(
        inner: Arc<ManagerInner>,
        ping_interval: Duration,
        max_failures: u32,
    ) -> JoinHandle<()> {
        log::info!(
            "💓 Starting keep-alive thread (interval: {:?}, max failures: {})",
            ping_interval,
            max_failures
        );

        thread::spawn(move || {
            let mut watched: Option<u64> = None;
            let mut failures = 0u32;

            loop {
                let timed_out = {
                    let (lock, cvar) = &*inner.shutdown_signal;
                    let shutdown = lock.lock().unwrap_or_else(PoisonError::into_inner);
                    let (shutdown, result) = cvar
                        .wait_timeout(shutdown, ping_interval)
                        .unwrap_or_else(PoisonError::into_inner);
                    if *shutdown {
                        break;
                    }
                    result.timed_out()
                };
                if !timed_out {
                    continue;
                }

                let Some(tracked) = inner.snapshot() else {
                    watched = None;
                    failures = 0;
                    continue;
                };
                if watched != Some(tracked.id()) {
                    watched = Some(tracked.id());
                    failures = 0;
                }

                match tracked.ping() {
                    Ok(()) => {
                        if failures > 0 {
                            log::debug!(
                                "Browser {} recovered after {} failed pings",
                                tracked.id(),
                                failures
                            );
                        }
                        failures = 0;
                    }
                    Err(e) if !inner.shutting_down.load(Ordering::SeqCst) => {
                        failures += 1;
                        log::warn!(
                            "Browser {} ping failed (attempt {}/{}): {}",
                            tracked.id(),
                            failures,
                            max_failures,
                            e
                        );
                        if failures >= max_failures {
                            inner.invalidate(tracked.id(), "disconnected (keep-alive)");
                            failures = 0;
                        }
                    }
                    Err(_) => break,
                }
            }

            log::info!("Keep-alive thread exiting cleanly");
        })
    }
}

impl Drop for BrowserManager {
    fn drop(&mut self) {
        if !self.is_shutting_down() {
            log::debug!("BrowserManager dropped without explicit shutdown, cleaning up");
        }
        self.shutdown();
    }
}

impl std::fmt::Debug for BrowserManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserManager")
            .field("status", &self.status())
            .field("launches", &self.launch_count())
            .field("leases", &self.lease_count())
            .finish()
    }
}

// ============================================================================
// BrowserManagerBuilder
// ============================================================================

/// Builder for [`BrowserManager`].
///
/// # Example
///
/// ```rust,ignore
/// let manager = BrowserManager::builder()
///     .factory(Box::new(ChromeBrowserFactory::with_defaults()))
///     .ping_interval(Duration::from_secs(10))
///     .build()?;
/// ```
pub struct BrowserManagerBuilder {
    factory: Option<Box<dyn BrowserFactory>>,
    ping_interval: Duration,
    max_ping_failures: u32,
    enable_keep_alive: bool,
}

impl BrowserManagerBuilder {
    /// Create a builder with 15s ping interval and 3 tolerated failures.
    pub fn new() -> Self {
        Self {
            factory: None,
            ping_interval: Duration::from_secs(15),
            max_ping_failures: 3,
            enable_keep_alive: true,
        }
    }

    /// Set the browser factory (required).
    pub fn factory(mut self, factory: Box<dyn BrowserFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the keep-alive ping interval.
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set consecutive ping failures tolerated before invalidation.
    pub fn max_ping_failures(mut self, failures: u32) -> Self {
        self.max_ping_failures = failures;
        self
    }

    /// Enable or disable the keep-alive thread (default: enabled).
    pub fn enable_keep_alive(mut self, enable: bool) -> Self {
        self.enable_keep_alive = enable;
        self
    }

    /// Build the manager. No browser is launched yet.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Configuration`] if no factory was provided or
    /// the keep-alive settings are zero.
    pub fn build(self) -> Result<BrowserManager> {
        let factory = self
            .factory
            .ok_or_else(|| BrowserError::Configuration("No browser factory provided".to_string()))?;

        if self.enable_keep_alive {
            if self.ping_interval.is_zero() {
                return Err("ping_interval must be greater than 0".into());
            }
            if self.max_ping_failures == 0 {
                return Err("max_ping_failures must be greater than 0".into());
            }
        }

        let inner = ManagerInner::new(factory);
        let keep_alive_handle = if self.enable_keep_alive {
            Some(BrowserManager::start_keep_alive(
                Arc::clone(&inner),
                self.ping_interval,
                self.max_ping_failures,
            ))
        } else {
            log::debug!("Keep-alive thread disabled");
            None
        };

        Ok(BrowserManager {
            inner,
            keep_alive_handle: Mutex::new(keep_alive_handle),
        })
    }
}

impl Default for BrowserManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::mock::{MockBehavior, MockBrowserFactory};
    use std::sync::Barrier;

    fn build(factory: MockBrowserFactory) -> BrowserManager {
        BrowserManager::builder()
            .factory(Box::new(factory))
            .enable_keep_alive(false)
            .build()
            .unwrap()
    }

    /// Verifies that building without a factory is a configuration error.
    #[test]
    fn test_builder_missing_factory() {
        match BrowserManager::builder().build() {
            Err(BrowserError::Configuration(msg)) => assert!(msg.contains("factory")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_rejects_zero_ping_failures() {
        let result = BrowserManager::builder()
            .factory(Box::new(MockBrowserFactory::new()))
            .max_ping_failures(0)
            .build();
        assert!(matches!(result, Err(BrowserError::Configuration(_))));
    }

    /// Verifies lazy launch: nothing starts until the first acquire.
    #[test]
    fn test_lazy_launch_and_cache() {
        let factory = MockBrowserFactory::new();
        let probes = factory.probes();
        let manager = build(factory);

        assert_eq!(manager.status(), BrowserStatus::Absent);
        assert_eq!(probes.launches(), 0);

        let first = manager.acquire().unwrap();
        let second = manager.acquire().unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(probes.launches(), 1);
        assert_eq!(manager.status(), BrowserStatus::Ready);
    }

    /// Verifies that a failed launch leaves the manager retryable.
    #[test]
    fn test_launch_failure_returns_to_absent() {
        let factory = MockBrowserFactory::always_fails("no chrome");
        let control = factory.control();
        let manager = build(factory);

        assert!(matches!(manager.acquire(), Err(BrowserError::Launch(_))));
        assert_eq!(manager.status(), BrowserStatus::Absent);

        control.update(|b| b.launch_error = None);
        assert!(manager.acquire().is_ok());
        assert_eq!(manager.launch_count(), 2);
    }

    /// Verifies relaunch after invalidation.
    #[test]
    fn test_invalidate_then_relaunch() {
        let factory = MockBrowserFactory::new();
        let probes = factory.probes();
        let manager = build(factory);

        let id = manager.acquire().unwrap().id();
        assert!(manager.invalidate(id, "test"));
        assert_eq!(manager.status(), BrowserStatus::Dead);
        assert_eq!(probes.processes_closed(), 1, "Unleased process should close immediately");

        let next = manager.acquire().unwrap();
        assert_ne!(next.id(), id);
        assert_eq!(probes.launches(), 2);
    }

    /// Verifies that a browser that died while idle is replaced on acquire.
    #[test]
    fn test_dead_browser_replaced_on_acquire() {
        let factory = MockBrowserFactory::new();
        let control = factory.control();
        let manager = build(factory);

        let id = manager.acquire().unwrap().id();
        control.kill_all();

        let next = manager.acquire().unwrap();
        assert_ne!(next.id(), id);
        assert!(next.is_alive());
    }

    /// Verifies that concurrent first acquisitions launch a single process.
    #[test]
    fn test_concurrent_acquire_launches_once() {
        let factory = MockBrowserFactory::new();
        let probes = factory.probes();
        let manager = Arc::new(build(factory));
        let barrier = Arc::new(Barrier::new(8));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    manager.acquire().map(|h| h.id())
                })
            })
            .collect();

        let ids: Vec<u64> = threads
            .into_iter()
            .map(|t| t.join().unwrap().unwrap())
            .collect();

        assert_eq!(probes.launches(), 1);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    /// Verifies that shutdown is idempotent and closes the process once.
    #[test]
    fn test_shutdown_idempotent() {
        let factory = MockBrowserFactory::new();
        let probes = factory.probes();
        let manager = build(factory);

        drop(manager.acquire().unwrap());
        manager.shutdown();
        manager.shutdown();

        assert_eq!(manager.status(), BrowserStatus::Closed);
        assert_eq!(probes.processes_closed(), 1);
        assert!(matches!(manager.acquire(), Err(BrowserError::ShuttingDown)));
    }

    #[test]
    fn test_shutdown_without_browser() {
        let manager = build(MockBrowserFactory::new());
        manager.shutdown();
        assert_eq!(manager.status(), BrowserStatus::Closed);
        assert_eq!(manager.launch_count(), 0);
    }

    /// Verifies that the keep-alive thread invalidates a disconnected browser.
    #[test]
    fn test_keep_alive_detects_disconnect() {
        let factory = MockBrowserFactory::with_behavior(MockBehavior::default());
        let control = factory.control();
        let manager = BrowserManager::builder()
            .factory(Box::new(factory))
            .ping_interval(Duration::from_millis(10))
            .max_ping_failures(2)
            .build()
            .unwrap();

        drop(manager.acquire().unwrap());
        control.kill_all();

        let deadline = Instant::now() + Duration::from_secs(2);
        while manager.status() != BrowserStatus::Dead && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(manager.status(), BrowserStatus::Dead);
        manager.shutdown();
    }

    #[tokio::test]
    async fn test_warmup_launches_eagerly() {
        let factory = MockBrowserFactory::new();
        let probes = factory.probes();
        let manager = build(factory);

        manager.warmup().await.unwrap();
        assert_eq!(probes.launches(), 1);
        assert_eq!(manager.status(), BrowserStatus::Ready);
        assert_eq!(manager.lease_count(), 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let manager = build(MockBrowserFactory::new());
        let handle = manager.acquire().unwrap();

        let stats = manager.stats();
        assert_eq!(stats.status, BrowserStatus::Ready);
        assert_eq!(stats.browser_id, Some(handle.id()));
        assert_eq!(stats.launches, 1);
        assert_eq!(stats.leases, 1);
    }
}
