//! Service configuration.
//!
//! All tunables live in [`ServiceConfig`], built once at startup and handed to
//! the components that need it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{CheckError, CheckResult, TrimPolicy};

/// Executable plus fixed flags for one pass. The source path is appended last.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassCommand {
    /// Program name or path of the executable.
    pub program: String,

    /// Flags passed before the source path.
    pub args: Vec<String>,
}

impl PassCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Syntax pass: non-fatal parse errors, no per-file error limit.
    pub fn default_syntax() -> Self {
        Self::new(
            "verible-verilog-syntax",
            &["--parse_fatal=false", "--error_limit=0", "--format=gnu"],
        )
    }

    /// Lint pass. `module-filename` is always disabled because scratch files
    /// never carry the module's name.
    pub fn default_lint() -> Self {
        Self::new(
            "verible-verilog-lint",
            &[
                "--rules=-module-filename",
                "--parse_fatal=false",
                "--lint_fatal_errors=false",
                "--error_limit=0",
                "--format=gnu",
            ],
        )
    }
}

/// Configuration for the diagnostics service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Socket address the HTTP server binds to.
    pub bind: String,

    /// Origins allowed for cross-origin calls. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,

    /// Syntax pass command line.
    pub syntax: PassCommand,

    /// Lint pass command line.
    pub lint: PassCommand,

    /// Wall-clock limit for one tool invocation (milliseconds).
    pub timeout_ms: u64,

    /// Upper bound on syntax passes during iterative recovery.
    pub max_recovery_iterations: u32,

    /// Whitespace normalization applied to submissions.
    pub trim: TrimPolicy,

    /// Reject submissions that contain no module declaration.
    pub require_module_declaration: bool,

    /// Echo the tool's raw output in responses.
    pub include_raw_output: bool,

    /// Maximum number of diagnostics kept from one tool invocation.
    pub max_diagnostics: usize,

    /// Maximum accepted request body size (bytes).
    pub max_body_bytes: usize,

    /// Directory for scratch source files. `None` uses the system temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// File suffix for scratch source files.
    pub source_suffix: String,

    /// Single-line comment marker used to neutralize lines during recovery.
    pub comment_marker: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            allowed_origins: vec!["*".to_string()],
            syntax: PassCommand::default_syntax(),
            lint: PassCommand::default_lint(),
            timeout_ms: 30_000,
            max_recovery_iterations: 100,
            trim: TrimPolicy::Both,
            require_module_declaration: false,
            include_raw_output: false,
            max_diagnostics: 1_000,
            max_body_bytes: 1024 * 1024,
            scratch_dir: None,
            source_suffix: ".sv".to_string(),
            comment_marker: "//".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `HDLCHECK_*` environment variables.
    pub fn from_env() -> CheckResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `HDLCHECK_*` key.
    pub fn from_lookup<F>(lookup: F) -> CheckResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = lookup("HDLCHECK_BIND") {
            config.bind = bind;
        }
        if let Some(origins) = lookup("HDLCHECK_ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(program) = lookup("HDLCHECK_SYNTAX_BIN") {
            config.syntax.program = program;
        }
        if let Some(program) = lookup("HDLCHECK_LINT_BIN") {
            config.lint.program = program;
        }
        if let Some(raw) = lookup("HDLCHECK_TIMEOUT_MS") {
            config.timeout_ms = parse_number("HDLCHECK_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("HDLCHECK_MAX_RECOVERY_ITERATIONS") {
            config.max_recovery_iterations =
                parse_number("HDLCHECK_MAX_RECOVERY_ITERATIONS", &raw)?;
        }
        if let Some(raw) = lookup("HDLCHECK_TRIM") {
            config.trim = raw.parse()?;
        }
        if let Some(raw) = lookup("HDLCHECK_REQUIRE_MODULE") {
            config.require_module_declaration = parse_flag("HDLCHECK_REQUIRE_MODULE", &raw)?;
        }
        if let Some(raw) = lookup("HDLCHECK_INCLUDE_RAW_OUTPUT") {
            config.include_raw_output = parse_flag("HDLCHECK_INCLUDE_RAW_OUTPUT", &raw)?;
        }
        if let Some(raw) = lookup("HDLCHECK_MAX_BODY_BYTES") {
            config.max_body_bytes = parse_number("HDLCHECK_MAX_BODY_BYTES", &raw)?;
        }
        if let Some(dir) = lookup("HDLCHECK_SCRATCH_DIR") {
            config.scratch_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> CheckResult<()> {
        if self.timeout_ms == 0 {
            return Err(CheckError::InvalidConfig(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        if self.max_recovery_iterations == 0 {
            return Err(CheckError::InvalidConfig(
                "max_recovery_iterations must be greater than zero".into(),
            ));
        }
        if self.syntax.program.trim().is_empty() || self.lint.program.trim().is_empty() {
            return Err(CheckError::InvalidConfig(
                "tool program names must not be empty".into(),
            ));
        }
        if self.allowed_origins.is_empty() {
            return Err(CheckError::InvalidConfig(
                "at least one allowed origin is required (use \"*\" to allow all)".into(),
            ));
        }
        if self.max_diagnostics == 0 {
            return Err(CheckError::InvalidConfig(
                "max_diagnostics must be greater than zero".into(),
            ));
        }
        if self.comment_marker.is_empty() {
            return Err(CheckError::InvalidConfig(
                "comment_marker must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Directory scratch files are created in.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> CheckResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| CheckError::InvalidConfig(format!("{key}: '{raw}' is not a valid number")))
}

fn parse_flag(key: &str, raw: &str) -> CheckResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CheckError::InvalidConfig(format!(
            "{key}: '{raw}' is not a boolean"
        ))),
    }
}
