//! Iterative error recovery.
//!
//! Many syntax checkers stop at the first fatal error. To report more than
//! one per request the syntax pass is re-run in a bounded loop: each round
//! records the first diagnostic, comments out the line it points at, and
//! tries again, until a pass comes back clean, the reported line cannot be
//! located, or the iteration bound is hit.
//!
//! Only single physical lines are neutralized. An error rooted in a
//! multi-line construct (block comment, string or macro continuation) may
//! keep reappearing until the bound stops the loop.

use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::domain::{CheckResult, Diagnostic};
use crate::metrics::METRICS;
use crate::normalize::DiagnosticNormalizer;
use crate::obs;
use crate::scratch::ScratchFile;
use crate::toolchain::{self, DiagnosticsTool, PassKind};

/// Why the recovery loop stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A pass produced no diagnostics.
    Clean,
    /// The tool pointed at a line outside the source.
    LineOutOfRange,
    /// The iteration bound was reached.
    IterationLimit,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Clean => "clean",
            StopReason::LineOutOfRange => "line_out_of_range",
            StopReason::IterationLimit => "iteration_limit",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effect of neutralizing one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neutralization {
    Commented,
    AlreadyCommented,
    OutOfRange,
}

/// Prefix 1-based `line` with `marker` unless it is already a comment.
pub fn neutralize_line(lines: &mut [String], line: u32, marker: &str) -> Neutralization {
    let Some(index) = (line as usize).checked_sub(1) else {
        return Neutralization::OutOfRange;
    };
    let Some(text) = lines.get_mut(index) else {
        return Neutralization::OutOfRange;
    };
    if text.trim_start().starts_with(marker) {
        return Neutralization::AlreadyCommented;
    }
    text.insert_str(0, marker);
    Neutralization::Commented
}

/// Outcome of a recovery run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryReport {
    /// First diagnostic of each failing pass, in discovery order.
    pub diagnostics: Vec<Diagnostic>,

    /// Number of syntax passes run, including the final clean one.
    pub iterations: u32,

    pub stop_reason: StopReason,
}

impl RecoveryReport {
    /// Synthetic exit status: 1 when anything was found, else 0.
    pub fn returncode(&self) -> i32 {
        if self.diagnostics.is_empty() {
            0
        } else {
            1
        }
    }
}

/// Run the syntax pass repeatedly over `lines`, neutralizing one line per round.
///
/// Each round materializes the current lines in a fresh scratch file that is
/// removed before the next round starts. Tool failures (missing executable,
/// timeout) abort the loop and propagate.
pub async fn recover<T>(
    tool: &T,
    normalizer: &DiagnosticNormalizer,
    config: &ServiceConfig,
    mut lines: Vec<String>,
) -> CheckResult<RecoveryReport>
where
    T: DiagnosticsTool + ?Sized,
{
    let max_iterations = config.max_recovery_iterations.max(1);
    let timeout = std::time::Duration::from_millis(config.timeout_ms);
    let scratch_dir = config.scratch_root();

    let mut diagnostics = Vec::new();
    let mut iterations = 0u32;

    let stop_reason = loop {
        let result = {
            let scratch =
                ScratchFile::create(&scratch_dir, &config.source_suffix, &lines.join("\n"))?;
            toolchain::invoke(tool, PassKind::Syntax, scratch.path(), timeout).await?
        };
        iterations += 1;

        let found = normalizer.normalize(&result).diagnostics;
        obs::emit_pass_completed(PassKind::Syntax, result.exit_code, result.duration_ms, found.len());

        let Some(first) = found.into_iter().next() else {
            break StopReason::Clean;
        };
        let line = first.line;
        diagnostics.push(first);

        if neutralize_line(&mut lines, line, &config.comment_marker) == Neutralization::OutOfRange {
            break StopReason::LineOutOfRange;
        }
        if iterations >= max_iterations {
            break StopReason::IterationLimit;
        }
    };

    METRICS.add_recovery_iterations(u64::from(iterations));
    obs::emit_recovery_finished(iterations, diagnostics.len(), stop_reason);

    Ok(RecoveryReport {
        diagnostics,
        iterations,
        stop_reason,
    })
}
