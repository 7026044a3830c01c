//! Domain model for hdlcheck.
//!
//! - `Submission`: validated source text supplied by a caller
//! - `Diagnostic`: one normalized problem reported by the toolchain
//! - `CheckError`: service-level error taxonomy

pub mod diagnostic;
pub mod error;
pub mod submission;

pub use diagnostic::{ColumnSpan, Diagnostic, Severity};
pub use error::{CheckError, CheckResult};
pub use submission::{Submission, TrimPolicy};
