//! In-process fakes for [`DiagnosticsTool`] (testing only)
//!
//! [`ScriptedTool`] reads the scratch file it is handed and answers with
//! whatever its closure returns, so service and recovery logic can be
//! exercised without the real toolchain installed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{CheckError, CheckResult};
use crate::toolchain::{DiagnosticsTool, InvocationResult, PassKind};

type RespondFn = dyn Fn(PassKind, &str) -> InvocationResult + Send + Sync;
type FailFn = dyn Fn() -> CheckError + Send + Sync;

enum Behaviour {
    Respond(Box<RespondFn>),
    Fail(Box<FailFn>),
}

/// Closure-driven fake toolchain that records every invocation.
pub struct ScriptedTool {
    behaviour: Behaviour,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(PassKind, PathBuf)>>,
}

impl ScriptedTool {
    /// Answer each run with `respond(pass, source_text)`.
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(PassKind, &str) -> InvocationResult + Send + Sync + 'static,
    {
        Self::with_behaviour(Behaviour::Respond(Box::new(respond)))
    }

    /// Fail every run with the error `fail` builds.
    pub fn failing<F>(fail: F) -> Self
    where
        F: Fn() -> CheckError + Send + Sync + 'static,
    {
        Self::with_behaviour(Behaviour::Fail(Box::new(fail)))
    }

    /// Always answer with the same canned output.
    pub fn canned(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        let result = InvocationResult::new(exit_code, stdout, stderr);
        Self::new(move |_, _| result.clone())
    }

    /// Sleep for `delay` before answering, subject to the caller's timeout.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn with_behaviour(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Scratch paths handed to the tool, in call order.
    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Passes requested, in call order.
    pub fn seen_passes(&self) -> Vec<PassKind> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, _)| *k)
            .collect()
    }
}

#[async_trait]
impl DiagnosticsTool for ScriptedTool {
    async fn run(
        &self,
        pass: PassKind,
        source: &Path,
        timeout: Duration,
    ) -> CheckResult<InvocationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((pass, source.to_path_buf()));

        let text = tokio::fs::read_to_string(source).await?;

        if let Some(delay) = self.delay {
            tokio::time::timeout(timeout, tokio::time::sleep(delay))
                .await
                .map_err(|_| CheckError::ToolTimeout {
                    tool: format!("scripted-{pass}"),
                    limit_ms: timeout.as_millis() as u64,
                })?;
        }

        match &self.behaviour {
            Behaviour::Respond(respond) => Ok(respond(pass, &text)),
            Behaviour::Fail(fail) => Err(fail()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_tool_sees_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sv");
        std::fs::write(&path, "module a;\n").unwrap();

        let tool = ScriptedTool::new(|pass, text| {
            InvocationResult::new(0, format!("{pass}:{}", text.trim()), "")
        });
        let result = tool
            .run(PassKind::Lint, &path, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(result.stdout, "lint:module a;");
        assert_eq!(tool.call_count(), 1);
        assert_eq!(tool.seen_passes(), vec![PassKind::Lint]);
        assert_eq!(tool.seen_paths(), vec![path]);
    }

    #[test]
    fn test_recording_survives_poisoned_lock() {
        let tool = std::sync::Arc::new(ScriptedTool::canned(0, "", ""));
        let holder = std::sync::Arc::clone(&tool);
        let _ = std::thread::spawn(move || {
            let _guard = holder.seen.lock().unwrap();
            panic!("poison the call log");
        })
        .join();

        assert!(tool.seen.is_poisoned());
        assert!(tool.seen_paths().is_empty());
        assert!(tool.seen_passes().is_empty());
    }

    #[tokio::test]
    async fn test_delay_past_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sv");
        std::fs::write(&path, "x\n").unwrap();

        let tool = ScriptedTool::canned(0, "", "").with_delay(Duration::from_millis(200));
        let err = tool
            .run(PassKind::Syntax, &path, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::ToolTimeout { limit_ms: 20, .. }));
    }
}
