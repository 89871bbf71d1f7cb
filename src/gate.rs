//! Concurrency gate for render tasks.
//!
//! [`RenderGate`] bounds the number of simultaneous renders. Requests beyond
//! the bound wait in arrival order; none are rejected for being over the
//! limit.
//!
//! A [`GatePermit`] is an owned RAII token. The render service moves it into
//! the blocking render job, so the slot is released when the job actually
//! finishes, even if the HTTP client has already gone away.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::service::PdfServiceError;
use crate::stats::GateStats;

#[derive(Debug, Default)]
struct GateCounters {
    in_flight: AtomicUsize,
    queued: AtomicUsize,
}

/// FIFO counting gate.
///
/// Backed by [`tokio::sync::Semaphore`], which serves waiters in the order
/// they arrived.
#[derive(Debug)]
pub struct RenderGate {
    semaphore: Arc<Semaphore>,
    max: usize,
    counters: Arc<GateCounters>,
}

impl RenderGate {
    /// Create a gate admitting `max` renders at a time (at least one).
    pub fn new(max: usize) -> Self {
        let max = if max == 0 {
            log::warn!("⚠️ Render concurrency of 0 requested, using 1");
            1
        } else {
            max
        };
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
            counters: Arc::new(GateCounters::default()),
        }
    }

    /// Wait for a slot.
    ///
    /// Cancel-safe: dropping the future while queued gives up the place in
    /// line without consuming a slot.
    ///
    /// # Errors
    ///
    /// Returns [`PdfServiceError::ShuttingDown`] once the gate is closed.
    pub async fn acquire(&self) -> Result<GatePermit, PdfServiceError> {
        let queued = QueuedGuard::enter(&self.counters);
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PdfServiceError::ShuttingDown)?;
        drop(queued);

        self.counters.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(GatePermit {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Configured bound.
    pub fn max_concurrency(&self) -> usize {
        self.max
    }

    /// Current counters.
    pub fn stats(&self) -> GateStats {
        GateStats {
            max_concurrency: self.max,
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            queued: self.counters.queued.load(Ordering::SeqCst),
        }
    }

    /// Stop admitting work. Queued and future callers get
    /// [`PdfServiceError::ShuttingDown`]; permits already held stay valid.
    pub fn close(&self) {
        if !self.semaphore.is_closed() {
            log::info!("🚧 Render gate closed");
            self.semaphore.close();
        }
    }

    /// `true` after [`close()`](Self::close).
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

/// A held render slot. Dropping it admits the next queued request.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<GateCounters>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct QueuedGuard<'a>(&'a GateCounters);

impl<'a> QueuedGuard<'a> {
    fn enter(counters: &'a GateCounters) -> Self {
        counters.queued.fetch_add(1, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.queued.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
