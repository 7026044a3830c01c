//! hdlcheck core library
//!
//! Runs an external HDL syntax checker or linter against submitted source
//! text and turns its output into structured diagnostics.
//!
//! Pipeline per request:
//!
//! ```text
//! Submission → ScratchFile → DiagnosticsTool::run → DiagnosticNormalizer → CheckReport
//!                  ↑                                         |
//!                  └──── recovery: comment out first error ──┘
//! ```

pub mod config;
pub mod domain;
pub mod fakes;
pub mod metrics;
pub mod normalize;
pub mod obs;
pub mod recovery;
pub mod scratch;
pub mod service;
pub mod telemetry;
pub mod toolchain;

pub use config::{PassCommand, ServiceConfig};
pub use domain::{
    CheckError, CheckResult, ColumnSpan, Diagnostic, Severity, Submission, TrimPolicy,
};
pub use metrics::{MetricsSnapshot, METRICS};
pub use normalize::{DiagnosticNormalizer, LinePattern, Normalized};
pub use recovery::{neutralize_line, recover, Neutralization, RecoveryReport, StopReason};
pub use scratch::ScratchFile;
pub use service::{CheckReport, CheckRequest, DiagnosticsService};
pub use telemetry::init_tracing;
pub use toolchain::{DiagnosticsTool, InvocationResult, PassKind, ProcessTool};

/// hdlcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
