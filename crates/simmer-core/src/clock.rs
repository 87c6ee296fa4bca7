//! Clock abstraction so the countdown loop can be driven without wall-clock
//! waits in tests.
//!
//! [`SystemClock`] is the production implementation (monotonic `Instant` +
//! `tokio::time::sleep`). [`ManualClock`] is a deterministic double: reads
//! come from a virtual counter, and `sleep` resolves immediately after
//! advancing that counter by the requested amount.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Boxed sleep future returned by [`Clock::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Source of monotonic time and task suspension.
pub trait Clock: Send + Sync {
    /// Monotonic milliseconds since an arbitrary origin. Never decreases
    /// within a run.
    fn now_ms(&self) -> u64;

    /// Suspend the calling task for `ms` milliseconds without blocking
    /// others. Returns early only when the future is dropped.
    fn sleep(&self, ms: u64) -> SleepFuture<'_>;
}

/// Monotonic clock backed by `Instant::now()` and the tokio timer.
///
/// Resets when the process restarts; countdown state is in-memory only, so
/// that is the lifetime that matters here.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn sleep(&self, ms: u64) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(Duration::from_millis(ms)))
    }
}

/// Manually advanceable clock for deterministic tests.
///
/// `sleep` advances the virtual counter by the full requested duration and
/// resolves on the next scheduler turn, so a loop that sleeps between cycles
/// free-runs through virtual time as fast as the executor can poll it.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock seeded at `start_ms`.
    pub fn starting_at(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Advance the virtual clock by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep(&self, ms: u64) -> SleepFuture<'_> {
        let now = Arc::clone(&self.now);
        Box::pin(async move {
            // Yield once so cancellation has a chance to land at the sleep
            // boundary, as it would with a real timer.
            tokio::task::yield_now().await;
            now.fetch_add(ms, Ordering::SeqCst);
        })
    }
}
