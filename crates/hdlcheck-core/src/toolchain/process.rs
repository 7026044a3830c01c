//! Subprocess-backed [`DiagnosticsTool`].

use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{DiagnosticsTool, InvocationResult, PassKind};
use crate::config::{PassCommand, ServiceConfig};
use crate::domain::{CheckError, CheckResult};

/// Runs the configured executables as child processes.
#[derive(Debug, Clone)]
pub struct ProcessTool {
    syntax: PassCommand,
    lint: PassCommand,
}

impl ProcessTool {
    pub fn new(syntax: PassCommand, lint: PassCommand) -> Self {
        Self { syntax, lint }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.syntax.clone(), config.lint.clone())
    }

    fn command_for(&self, pass: PassKind) -> &PassCommand {
        match pass {
            PassKind::Syntax => &self.syntax,
            PassKind::Lint => &self.lint,
        }
    }
}

#[async_trait]
impl DiagnosticsTool for ProcessTool {
    async fn run(
        &self,
        pass: PassKind,
        source: &Path,
        timeout: Duration,
    ) -> CheckResult<InvocationResult> {
        let command = self.command_for(pass);
        let start = Instant::now();
        debug!(pass = %pass, program = %command.program, source = %source.display(), "spawning tool");

        // kill_on_drop: a timed-out child is killed when the wait future is dropped.
        let child = Command::new(&command.program)
            .args(&command.args)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => CheckError::ToolUnavailable {
                    tool: command.program.clone(),
                },
                _ => CheckError::Invocation {
                    tool: command.program.clone(),
                    reason: e.to_string(),
                },
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| CheckError::ToolTimeout {
                tool: command.program.clone(),
                limit_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| CheckError::Invocation {
                tool: command.program.clone(),
                reason: e.to_string(),
            })?;

        Ok(InvocationResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_executable_is_tool_unavailable() {
        let tool = ProcessTool::new(
            PassCommand::new("hdlcheck-definitely-not-installed", &[]),
            PassCommand::default_lint(),
        );
        let err = tool
            .run(PassKind::Syntax, Path::new("x.sv"), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            CheckError::ToolUnavailable { tool } => {
                assert_eq!(tool, "hdlcheck-definitely-not-installed")
            }
            other => panic!("expected ToolUnavailable, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let tool = ProcessTool::new(
            PassCommand::new("sh", &["-c", "echo \"$0:1:1: error: boom\"; exit 1"]),
            PassCommand::default_lint(),
        );
        let result = tool
            .run(PassKind::Syntax, Path::new("top.sv"), Duration::from_secs(5))
            .await
            .expect("run");
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stdout.trim(), "top.sv:1:1: error: boom");
    }
}
