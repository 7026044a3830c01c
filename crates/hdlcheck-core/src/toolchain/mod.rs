//! External toolchain invocation.
//!
//! The syntax checker and linter are opaque executables. This module only
//! builds their command lines, runs them with captured output and a
//! wall-clock limit, and hands back exit code plus raw text. A nonzero exit
//! code is a normal outcome, not an error.

pub mod process;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CheckError, CheckResult};
use crate::metrics::METRICS;

pub use process::ProcessTool;

/// Which analysis pass to run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Parse-only syntax check.
    Syntax,
    /// Style lint.
    Lint,
}

impl PassKind {
    pub fn name(&self) -> &'static str {
        match self {
            PassKind::Syntax => "syntax",
            PassKind::Lint => "lint",
        }
    }
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for PassKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "syntax" | "compile" => Ok(PassKind::Syntax),
            "lint" => Ok(PassKind::Lint),
            other => Err(format!("unknown pass '{other}' (expected 'syntax' or 'lint')")),
        }
    }
}

/// Captured outcome of one tool run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Process exit code; -1 when the process was ended by a signal.
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl InvocationResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration_ms: 0,
        }
    }

    /// stdout followed by stderr, as echoed back in `raw_output`.
    pub fn combined_output(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }
}

/// Capability to run a pass of the external toolchain against a file.
#[async_trait]
pub trait DiagnosticsTool: Send + Sync {
    /// Run `pass` against `source`, killing the tool if it outlives `timeout`.
    async fn run(
        &self,
        pass: PassKind,
        source: &Path,
        timeout: Duration,
    ) -> CheckResult<InvocationResult>;
}

/// Run one pass through `tool`, keeping the invocation and timeout counters.
pub async fn invoke<T>(
    tool: &T,
    pass: PassKind,
    source: &Path,
    timeout: Duration,
) -> CheckResult<InvocationResult>
where
    T: DiagnosticsTool + ?Sized,
{
    METRICS.inc_tool_invocations();
    let result = tool.run(pass, source, timeout).await;
    if let Err(CheckError::ToolTimeout { .. }) = &result {
        METRICS.inc_tool_timeouts();
    }
    result
}
