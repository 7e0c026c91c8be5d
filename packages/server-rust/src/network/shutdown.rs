//! Serving lifecycle: health state, in-flight query tracking, and
//! cancellation of queries still running when a drain times out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;

/// Server health state.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Ready,
    /// Shutdown was signalled; in-flight queries are finishing.
    Draining,
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Starting => "starting",
            HealthState::Ready => "ready",
            HealthState::Draining => "draining",
            HealthState::Stopped => "stopped",
        }
    }
}

/// Tracks health and in-flight queries, and owns the token that cancels
/// every query started through [`query_token`](Self::query_token).
#[derive(Debug)]
pub struct ShutdownController {
    health: ArcSwap<HealthState>,
    in_flight: Arc<AtomicU64>,
    queries: CancellationToken,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            health: ArcSwap::from_pointee(HealthState::Starting),
            in_flight: Arc::new(AtomicU64::new(0)),
            queries: CancellationToken::new(),
        }
    }

    pub fn set_ready(&self) {
        self.health.store(Arc::new(HealthState::Ready));
    }

    /// Moves to `Draining`. Running queries are left to finish.
    pub fn trigger_shutdown(&self) {
        self.health.store(Arc::new(HealthState::Draining));
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health.load()
    }

    /// Token for one query; fires when [`cancel_queries`](Self::cancel_queries) is called.
    #[must_use]
    pub fn query_token(&self) -> CancellationToken {
        self.queries.child_token()
    }

    /// Cancels every query holding a token from [`query_token`](Self::query_token).
    pub fn cancel_queries(&self) {
        self.queries.cancel();
    }

    /// Whether [`cancel_queries`](Self::cancel_queries) has fired.
    #[must_use]
    pub fn queries_cancelled(&self) -> bool {
        self.queries.is_cancelled()
    }

    /// Counts a query as in flight until the guard is dropped.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits up to `timeout` for in-flight queries to finish.
    ///
    /// On success the state becomes `Stopped` and `true` is returned. On
    /// timeout the remaining queries are cancelled, the state stays
    /// `Draining`, and `false` is returned.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.in_flight_count() > 0 {
            if tokio::time::Instant::now() >= deadline {
                self.cancel_queries();
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.health.store(Arc::new(HealthState::Stopped));
        true
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter on drop, including during unwinding.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
