//! Global atomic counters for hdlcheck.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single `tracing::info!`
//! event, or [`Metrics::snapshot`] to serve them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, lock-free.
pub struct Metrics {
    requests_handled: AtomicU64,
    tool_invocations: AtomicU64,
    tool_timeouts: AtomicU64,
    diagnostics_emitted: AtomicU64,
    recovery_iterations: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub requests_handled: u64,
    pub tool_invocations: u64,
    pub tool_timeouts: u64,
    pub diagnostics_emitted: u64,
    pub recovery_iterations: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            requests_handled: AtomicU64::new(0),
            tool_invocations: AtomicU64::new(0),
            tool_timeouts: AtomicU64::new(0),
            diagnostics_emitted: AtomicU64::new(0),
            recovery_iterations: AtomicU64::new(0),
        }
    }

    pub fn inc_requests(&self) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "requests_handled", "counter incremented");
    }

    pub fn inc_tool_invocations(&self) {
        self.tool_invocations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "tool_invocations", "counter incremented");
    }

    pub fn inc_tool_timeouts(&self) {
        self.tool_timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "tool_timeouts", "counter incremented");
    }

    pub fn add_diagnostics(&self, count: u64) {
        self.diagnostics_emitted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_recovery_iterations(&self, count: u64) {
        self.recovery_iterations.fetch_add(count, Ordering::Relaxed);
    }

    /// Read every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_handled: self.requests_handled.load(Ordering::Relaxed),
            tool_invocations: self.tool_invocations.load(Ordering::Relaxed),
            tool_timeouts: self.tool_timeouts.load(Ordering::Relaxed),
            diagnostics_emitted: self.diagnostics_emitted.load(Ordering::Relaxed),
            recovery_iterations: self.recovery_iterations.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call at natural boundaries (shutdown, end of a CLI run) rather than
    /// on every increment.
    pub fn flush(&self) {
        let snap = self.snapshot();
        tracing::info!(
            metric = "flush",
            requests_handled = snap.requests_handled,
            tool_invocations = snap.tool_invocations,
            tool_timeouts = snap.tool_timeouts,
            diagnostics_emitted = snap.diagnostics_emitted,
            recovery_iterations = snap.recovery_iterations,
        );
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.requests_handled.store(0, Ordering::Relaxed);
        self.tool_invocations.store(0, Ordering::Relaxed);
        self.tool_timeouts.store(0, Ordering::Relaxed);
        self.diagnostics_emitted.store(0, Ordering::Relaxed);
        self.recovery_iterations.store(0, Ordering::Relaxed);
    }
}
