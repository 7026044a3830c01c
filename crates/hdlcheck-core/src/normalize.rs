//! Diagnostic normalizer.
//!
//! Turns raw tool output into ordered [`Diagnostic`] records. Each output
//! line is tried against an ordered list of [`LinePattern`]s, most explicit
//! first; the first pattern that yields a valid record wins. Lines no pattern
//! accepts (banners, summaries, source excerpts, blank lines) are skipped.
//!
//! Accepted shapes:
//!
//! ```text
//! path:LINE:COL[-END]: error|warning|info|note: message
//! path:LINE:COL-END: message
//! path:LINE:COL: message
//! ```
//!
//! When no severity token is present it is inferred from the message with
//! [`Severity::infer`].

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::domain::{Diagnostic, Severity};
use crate::toolchain::InvocationResult;

static STANDARD_PATTERNS: LazyLock<Vec<LinePattern>> = LazyLock::new(|| {
    [
        (
            "explicit_severity",
            r"^(?P<path>.*?):(?P<line>\d+):(?P<col>\d+)(?:-(?P<end>\d+))?:\s*(?P<sev>(?i:error|warning|info|note|fatal))\s*:\s*(?P<msg>.*)$",
        ),
        (
            "column_range",
            r"^(?P<path>.*?):(?P<line>\d+):(?P<col>\d+)-(?P<end>\d+):\s*(?P<msg>.*)$",
        ),
        (
            "column_point",
            r"^(?P<path>.*?):(?P<line>\d+):(?P<col>\d+):\s*(?P<msg>.*)$",
        ),
    ]
    .into_iter()
    .map(|(name, pattern)| {
        LinePattern::new(name, pattern).expect("standard diagnostic patterns are valid")
    })
    .collect()
});

/// One candidate shape for a diagnostic line.
///
/// Recognised capture groups: `line`, `col` and `msg` (required), `end` and
/// `sev` (optional). Anything else, such as `path`, is ignored.
#[derive(Debug, Clone)]
pub struct LinePattern {
    name: String,
    regex: Regex,
}

impl LinePattern {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build a diagnostic if the line matches and its numbers are valid.
    pub fn extract(&self, line: &str) -> Option<Diagnostic> {
        let caps = self.regex.captures(line)?;
        let line_no = positive(&caps, "line")?;
        let column = positive(&caps, "col")?;
        let message = caps.name("msg")?.as_str().trim().to_string();

        let severity = match caps.name("sev") {
            Some(token) => Severity::from_token(token.as_str())?,
            None => Severity::infer(&message),
        };

        match caps.name("end") {
            Some(_) => {
                let end = positive(&caps, "end")?;
                Some(Diagnostic::range(line_no, column, end, severity, message))
            }
            None => Some(Diagnostic::point(line_no, column, severity, message)),
        }
    }
}

/// 1-based number from a capture group; zero or overflow rejects the line.
fn positive(caps: &Captures<'_>, group: &str) -> Option<u32> {
    caps.name(group)?
        .as_str()
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
}

/// Diagnostics parsed from one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub diagnostics: Vec<Diagnostic>,

    /// The output held more records than the cap allowed.
    pub truncated: bool,
}

/// Parses tool output into diagnostics.
#[derive(Debug, Clone)]
pub struct DiagnosticNormalizer {
    patterns: Vec<LinePattern>,
    max_diagnostics: usize,
}

impl Default for DiagnosticNormalizer {
    fn default() -> Self {
        Self::standard()
    }
}

impl DiagnosticNormalizer {
    /// The built-in pattern list with no output cap.
    pub fn standard() -> Self {
        Self {
            patterns: STANDARD_PATTERNS.clone(),
            max_diagnostics: usize::MAX,
        }
    }

    /// A normalizer over a caller-supplied pattern list, tried in order.
    pub fn with_patterns(patterns: Vec<LinePattern>) -> Self {
        Self {
            patterns,
            max_diagnostics: usize::MAX,
        }
    }

    /// Keep at most `max` diagnostics per invocation.
    pub fn with_max_diagnostics(mut self, max: usize) -> Self {
        self.max_diagnostics = max;
        self
    }

    pub fn patterns(&self) -> &[LinePattern] {
        &self.patterns
    }

    /// Parse a single output line.
    pub fn parse_line(&self, line: &str) -> Option<Diagnostic> {
        self.patterns.iter().find_map(|p| p.extract(line))
    }

    /// Parse every line of `text`, preserving output order.
    pub fn parse(&self, text: &str) -> Vec<Diagnostic> {
        text.lines()
            .filter_map(|line| self.parse_line(line))
            .take(self.max_diagnostics)
            .collect()
    }

    /// Parse stdout, then stderr, of one invocation.
    pub fn normalize(&self, result: &InvocationResult) -> Normalized {
        let mut diagnostics: Vec<Diagnostic> = result
            .stdout
            .lines()
            .chain(result.stderr.lines())
            .filter_map(|line| self.parse_line(line))
            .take(self.max_diagnostics.saturating_add(1))
            .collect();

        let truncated = diagnostics.len() > self.max_diagnostics;
        diagnostics.truncate(self.max_diagnostics);
        Normalized {
            diagnostics,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ColumnSpan;

    fn parse_one(line: &str) -> Option<Diagnostic> {
        DiagnosticNormalizer::standard().parse_line(line)
    }

    #[test]
    fn test_explicit_error() {
        let diag = parse_one("/tmp/x.sv:12:5: error: foo").expect("match");
        assert_eq!(diag, Diagnostic::point(12, 5, Severity::Error, "foo"));
    }

    #[test]
    fn test_explicit_warning_keeps_token_over_message() {
        let diag = parse_one("x.sv:3:1: warning: error-prone construct").expect("match");
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.message, "error-prone construct");
    }

    #[test]
    fn test_range_without_severity_infers_info() {
        let diag = parse_one("path:7:2-9: bar").expect("match");
        assert_eq!(diag.severity, Severity::Info);
        assert_eq!(
            diag.span,
            ColumnSpan::Range {
                column_start: 2,
                column_end: 9
            }
        );
    }

    #[test]
    fn test_point_without_severity_infers_from_message() {
        let diag = parse_one("top.sv:4:10: syntax error at token \"endmodule\"").expect("match");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.span, ColumnSpan::Point { column: 10 });

        let diag = parse_one("top.sv:4:10: Warning about something").expect("match");
        assert_eq!(diag.severity, Severity::Warning);
    }

    #[test]
    fn test_lint_style_line() {
        let line = "/tmp/hdlcheck-1.sv:1:8-10: Module name does not match filename. [Style: file-names] [module-filename]";
        let diag = parse_one(line).expect("match");
        assert_eq!(diag.line, 1);
        assert_eq!(diag.span.start(), 8);
        assert_eq!(diag.span.end(), Some(10));
        assert_eq!(diag.severity, Severity::Info);
    }

    #[test]
    fn test_both_words_classify_as_error() {
        let diag = parse_one("a.sv:1:1: this warning hides an error").expect("match");
        assert_eq!(diag.severity, Severity::Error);
    }

    #[test]
    fn test_message_is_trimmed() {
        let diag = parse_one("a.sv:2:3:    spaced out message   \r").expect("match");
        assert_eq!(diag.message, "spaced out message");
    }

    #[test]
    fn test_noise_is_ignored() {
        let normalizer = DiagnosticNormalizer::standard();
        for noise in [
            "",
            "Parsing file...",
            "   ^",
            "module m;",
            "a.sv:0:3: zero line",
            "a.sv:3:0: zero column",
            "a.sv:99999999999:1: overflowing line",
            "a.sv:x:1: not a number",
        ] {
            assert!(normalizer.parse_line(noise).is_none(), "matched noise: {noise:?}");
        }
    }

    #[test]
    fn test_order_and_duplicates_preserved() {
        let text = "banner\nf.sv:5:1: error: second\nf.sv:2:1: error: first\nf.sv:2:1: error: first\n";
        let diags = DiagnosticNormalizer::standard().parse(text);
        let lines: Vec<u32> = diags.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![5, 2, 2]);
    }

    #[test]
    fn test_normalize_reads_stdout_then_stderr() {
        let result = InvocationResult::new(1, "f.sv:1:1: error: out", "f.sv:9:9: warning: err");
        let normalized = DiagnosticNormalizer::standard().normalize(&result);
        assert!(!normalized.truncated);
        let diags = normalized.diagnostics;
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].line, 1);
        assert_eq!(diags[1].severity, Severity::Warning);
    }

    #[test]
    fn test_max_diagnostics_caps_output() {
        let text = "f.sv:1:1: a\nf.sv:2:1: b\nf.sv:3:1: c\n";
        let diags = DiagnosticNormalizer::standard()
            .with_max_diagnostics(2)
            .parse(text);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_normalize_flags_truncation() {
        let result = InvocationResult::new(1, "f.sv:1:1: a\nf.sv:2:1: b\n", "f.sv:3:1: c\n");

        let capped = DiagnosticNormalizer::standard()
            .with_max_diagnostics(2)
            .normalize(&result);
        assert!(capped.truncated);
        assert_eq!(capped.diagnostics.len(), 2);
        assert_eq!(capped.diagnostics[1].line, 2);

        let exact = DiagnosticNormalizer::standard()
            .with_max_diagnostics(3)
            .normalize(&result);
        assert!(!exact.truncated);
        assert_eq!(exact.diagnostics.len(), 3);
    }

    #[test]
    fn test_custom_pattern_list() {
        let pattern = LinePattern::new(
            "bracketed",
            r"^\[(?P<sev>error|warning)\] line (?P<line>\d+), col (?P<col>\d+): (?P<msg>.*)$",
        )
        .unwrap();
        let normalizer = DiagnosticNormalizer::with_patterns(vec![pattern]);
        let diag = normalizer
            .parse_line("[warning] line 4, col 2: unused signal")
            .expect("match");
        assert_eq!(diag, Diagnostic::point(4, 2, Severity::Warning, "unused signal"));
        assert_eq!(normalizer.patterns()[0].name(), "bracketed");
    }
}
