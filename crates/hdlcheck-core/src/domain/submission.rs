//! Caller-supplied source text and its validation.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::{CheckError, CheckResult};

static MODULE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:macro)?module\s+(?:automatic\s+|static\s+)?[A-Za-z_][A-Za-z0-9_$]*")
        .expect("module declaration pattern is valid")
});

/// Whitespace normalization applied to a submission before it is checked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrimPolicy {
    /// Strip leading and trailing whitespace.
    #[default]
    Both,
    /// Strip trailing whitespace only, keeping line numbers stable.
    Trailing,
}

impl TrimPolicy {
    pub fn apply<'a>(&self, raw: &'a str) -> &'a str {
        match self {
            TrimPolicy::Both => raw.trim(),
            TrimPolicy::Trailing => raw.trim_end(),
        }
    }
}

impl std::str::FromStr for TrimPolicy {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "both" => Ok(TrimPolicy::Both),
            "trailing" | "end" => Ok(TrimPolicy::Trailing),
            other => Err(CheckError::InvalidConfig(format!(
                "unknown trim policy '{other}' (expected 'both' or 'trailing')"
            ))),
        }
    }
}

/// A validated, request-scoped source submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    original: String,
    text: String,
}

impl Submission {
    /// Validate and normalize raw caller input.
    ///
    /// Rejects empty or whitespace-only input regardless of trim policy. When
    /// `require_module` is set, input without a module declaration is rejected
    /// before any tool runs.
    pub fn parse(raw: &str, trim: TrimPolicy, require_module: bool) -> CheckResult<Self> {
        let text = trim.apply(raw);
        if text.trim().is_empty() {
            return Err(CheckError::EmptySubmission);
        }
        if require_module && !MODULE_DECL.is_match(text) {
            return Err(CheckError::MissingModuleDeclaration);
        }
        Ok(Self {
            original: raw.to_string(),
            text: text.to_string(),
        })
    }

    /// The text exactly as received.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The normalized text handed to the toolchain.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Normalized text split into physical lines.
    pub fn lines(&self) -> Vec<String> {
        self.text.lines().map(str::to_string).collect()
    }

    /// Hex SHA-256 of the normalized text, for log correlation.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.text.as_bytes()))
    }
}
