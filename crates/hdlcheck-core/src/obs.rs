//! Structured observability hooks for the check lifecycle.
//!
//! - Request-scoped tracing span via the [`RequestSpan`] guard
//! - One emission function per lifecycle event
//!
//! Events are emitted at `info!` unless noted; filter with `RUST_LOG`.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::recovery::StopReason;
use crate::toolchain::PassKind;

/// Guard holding a span tagged with the request id and submission digest.
///
/// The span is entered only while the guard's future is polled, so it stays
/// attached across `.await` points.
pub struct RequestSpan {
    span: tracing::Span,
}

impl RequestSpan {
    pub fn new(request_id: &str, endpoint: &str, digest: &str) -> Self {
        let span = tracing::info_span!(
            "hdlcheck.request",
            request_id = %request_id,
            endpoint = %endpoint,
            digest = %digest,
        );
        Self { span }
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

/// Emit event: request accepted for checking.
pub fn emit_request_received(endpoint: &str, bytes: usize) {
    info!(event = "request.received", endpoint = %endpoint, bytes = bytes);
}

/// Emit event: request rejected before any tool ran, or aborted by an infrastructure fault.
pub fn emit_request_failed(endpoint: &str, kind: &str, error: &dyn std::fmt::Display) {
    warn!(event = "request.failed", endpoint = %endpoint, kind = %kind, error = %error);
}

/// Emit event: one tool pass finished.
pub fn emit_pass_completed(pass: PassKind, exit_code: i32, duration_ms: u64, diagnostics: usize) {
    info!(
        event = "pass.completed",
        pass = %pass,
        exit_code = exit_code,
        duration_ms = duration_ms,
        diagnostics = diagnostics,
    );
}

/// Emit event (warn): tool output exceeded the diagnostic cap.
pub fn emit_diagnostics_truncated(pass: PassKind, kept: usize) {
    warn!(event = "pass.truncated", pass = %pass, kept = kept);
}

/// Emit event: iterative recovery stopped.
pub fn emit_recovery_finished(iterations: u32, diagnostics: usize, reason: StopReason) {
    info!(
        event = "recovery.finished",
        iterations = iterations,
        diagnostics = diagnostics,
        stop_reason = %reason,
    );
}

/// Emit event (debug): scratch file deleted.
pub fn emit_scratch_removed(path: &Path) {
    debug!(event = "scratch.removed", path = %path.display());
}

/// Emit event (warn): scratch file could not be deleted.
pub fn emit_scratch_cleanup_error(path: &Path, error: &dyn std::fmt::Display) {
    warn!(event = "scratch.cleanup_error", path = %path.display(), error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_span_create() {
        let guard = RequestSpan::new("req-1", "/lint", "abc");
        let _entered = guard.span().enter();
        emit_request_received("/lint", 12);
    }
}
