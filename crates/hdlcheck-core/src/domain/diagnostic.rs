//! Normalized diagnostic types.

use serde::{Deserialize, Serialize};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Map an explicit severity token emitted by the tool.
    ///
    /// `note` is folded into [`Severity::Info`]. Unknown tokens yield `None`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "error" | "fatal" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "info" | "note" => Some(Severity::Info),
            _ => None,
        }
    }

    /// Classify a message that carried no severity token.
    ///
    /// Case-insensitive substring scan: "error" wins over "warning", and
    /// anything else is [`Severity::Info`].
    pub fn infer(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("error") {
            Severity::Error
        } else if lower.contains("warning") {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column location of a diagnostic: a single point or a `start-end` range.
///
/// Serialized flat into the parent record, as either `column` or
/// `column_start` + `column_end`, so a client can tell the two apart by key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ColumnSpan {
    Range { column_start: u32, column_end: u32 },
    Point { column: u32 },
}

impl ColumnSpan {
    pub fn start(&self) -> u32 {
        match self {
            ColumnSpan::Range { column_start, .. } => *column_start,
            ColumnSpan::Point { column } => *column,
        }
    }

    pub fn end(&self) -> Option<u32> {
        match self {
            ColumnSpan::Range { column_end, .. } => Some(*column_end),
            ColumnSpan::Point { .. } => None,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, ColumnSpan::Range { .. })
    }
}

/// A single problem reported by the toolchain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    /// Line number (1-indexed).
    pub line: u32,

    /// Column or column range (1-indexed).
    #[serde(flatten)]
    pub span: ColumnSpan,

    /// Reported or inferred severity.
    pub severity: Severity,

    /// Message text, trimmed.
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic at a single column.
    pub fn point(line: u32, column: u32, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            line,
            span: ColumnSpan::Point { column },
            severity,
            message: message.into(),
        }
    }

    /// Create a diagnostic spanning `column_start..=column_end`.
    pub fn range(
        line: u32,
        column_start: u32,
        column_end: u32,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            line,
            span: ColumnSpan::Range {
                column_start,
                column_end,
            },
            severity,
            message: message.into(),
        }
    }
}
