//! Request-level check pipeline.
//!
//! `validate → materialize → invoke → normalize`, plus the recovering
//! variant of the syntax pass. Each call owns its scratch file and shares
//! nothing mutable with concurrent calls.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::domain::{CheckError, CheckResult, Diagnostic, Submission};
use crate::metrics::METRICS;
use crate::normalize::DiagnosticNormalizer;
use crate::obs::{self, RequestSpan};
use crate::recovery::{self, StopReason};
use crate::scratch::ScratchFile;
use crate::toolchain::{self, DiagnosticsTool, PassKind};

/// Request body accepted by `/lint` and `/compile`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckRequest {
    pub code: String,

    /// Use iterative recovery (syntax pass only).
    #[serde(default)]
    pub recover: bool,
}

/// Response body for a completed check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckReport {
    pub errors: Vec<Diagnostic>,

    pub returncode: i32,

    /// Set when the tool reported more diagnostics than `max_diagnostics`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

/// Runs checks against a [`DiagnosticsTool`].
pub struct DiagnosticsService<T: ?Sized> {
    tool: Arc<T>,
    config: Arc<ServiceConfig>,
    normalizer: DiagnosticNormalizer,
}

impl<T: ?Sized> Clone for DiagnosticsService<T> {
    fn clone(&self) -> Self {
        Self {
            tool: Arc::clone(&self.tool),
            config: Arc::clone(&self.config),
            normalizer: self.normalizer.clone(),
        }
    }
}

impl<T> DiagnosticsService<T>
where
    T: DiagnosticsTool + ?Sized,
{
    pub fn new(tool: Arc<T>, config: ServiceConfig) -> Self {
        let normalizer =
            DiagnosticNormalizer::standard().with_max_diagnostics(config.max_diagnostics);
        Self {
            tool,
            config: Arc::new(config),
            normalizer,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Lint pass over `code`.
    pub async fn lint(&self, code: &str) -> CheckResult<CheckReport> {
        self.check(PassKind::Lint, code).await
    }

    /// Syntax pass over `code`.
    pub async fn compile(&self, code: &str) -> CheckResult<CheckReport> {
        self.check(PassKind::Syntax, code).await
    }

    /// Dispatch a decoded request body for `pass`.
    ///
    /// `recover` only applies to the syntax pass and is ignored for lint.
    pub async fn handle(&self, pass: PassKind, request: &CheckRequest) -> CheckResult<CheckReport> {
        if request.recover && pass == PassKind::Syntax {
            self.compile_with_recovery(&request.code).await
        } else {
            self.check(pass, &request.code).await
        }
    }

    /// Single pass over `code`, returning every diagnostic it produced.
    pub async fn check(&self, pass: PassKind, code: &str) -> CheckResult<CheckReport> {
        let submission = self.accept(pass.name(), code)?;
        let span = RequestSpan::new(&Uuid::new_v4().to_string(), pass.name(), &submission.digest());

        let outcome = async {
            obs::emit_request_received(pass.name(), submission.text().len());

            let result = {
                let scratch = ScratchFile::create(
                    &self.config.scratch_root(),
                    &self.config.source_suffix,
                    submission.text(),
                )?;
                toolchain::invoke(&*self.tool, pass, scratch.path(), self.timeout()).await?
            };

            let normalized = self.normalizer.normalize(&result);
            let errors = normalized.diagnostics;
            obs::emit_pass_completed(pass, result.exit_code, result.duration_ms, errors.len());
            if normalized.truncated {
                obs::emit_diagnostics_truncated(pass, errors.len());
            }
            METRICS.add_diagnostics(errors.len() as u64);

            Ok::<_, CheckError>(CheckReport {
                errors,
                returncode: result.exit_code,
                truncated: normalized.truncated,
                raw_output: self
                    .config
                    .include_raw_output
                    .then(|| result.combined_output()),
                file_content: None,
                iterations: None,
                stop_reason: None,
            })
        }
        .instrument(span.span().clone())
        .await;

        self.observe_failure(pass.name(), outcome)
    }

    /// Syntax pass with iterative recovery; see [`recovery::recover`].
    pub async fn compile_with_recovery(&self, code: &str) -> CheckResult<CheckReport> {
        let endpoint = "recover";
        let submission = self.accept(endpoint, code)?;
        let span = RequestSpan::new(&Uuid::new_v4().to_string(), endpoint, &submission.digest());

        let outcome = async {
            obs::emit_request_received(endpoint, submission.text().len());

            let report = recovery::recover(
                &*self.tool,
                &self.normalizer,
                &self.config,
                submission.lines(),
            )
            .await?;
            METRICS.add_diagnostics(report.diagnostics.len() as u64);

            let returncode = report.returncode();
            Ok::<_, CheckError>(CheckReport {
                errors: report.diagnostics,
                returncode,
                truncated: false,
                raw_output: None,
                file_content: Some(submission.original().to_string()),
                iterations: Some(report.iterations),
                stop_reason: Some(report.stop_reason),
            })
        }
        .instrument(span.span().clone())
        .await;

        self.observe_failure(endpoint, outcome)
    }

    fn accept(&self, endpoint: &str, code: &str) -> CheckResult<Submission> {
        METRICS.inc_requests();
        Submission::parse(
            code,
            self.config.trim,
            self.config.require_module_declaration,
        )
        .map_err(|e| {
            obs::emit_request_failed(endpoint, e.kind(), &e);
            e
        })
    }

    fn observe_failure(
        &self,
        endpoint: &str,
        outcome: CheckResult<CheckReport>,
    ) -> CheckResult<CheckReport> {
        if let Err(e) = &outcome {
            obs::emit_request_failed(endpoint, e.kind(), e);
        }
        outcome
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }
}

impl DiagnosticsService<dyn DiagnosticsTool> {
    /// Service backed by the real toolchain as configured.
    pub fn from_config(config: ServiceConfig) -> CheckResult<Self> {
        config.validate()?;
        let tool: Arc<dyn DiagnosticsTool> =
            Arc::new(toolchain::ProcessTool::from_config(&config));
        Ok(Self::new(tool, config))
    }
}
