//! hdlcheck - HDL syntax/lint diagnostics service
//!
//! ## Commands
//!
//! - `serve`: run the HTTP service (`/lint`, `/compile`, `/health`, `/metrics`)
//! - `check`: run one pass over a local file and print the JSON report

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hdlcheck_cli::HttpApp;
use hdlcheck_core::{CheckRequest, DiagnosticsService, PassKind, ServiceConfig};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "hdlcheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Syntax and lint diagnostics for HDL sources", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to listen on
        #[arg(long, env = "HDLCHECK_BIND")]
        bind: Option<String>,

        /// Origin allowed for cross-origin calls (repeatable, "*" for any)
        #[arg(long = "allowed-origin")]
        allowed_origins: Vec<String>,

        /// Per-invocation tool timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Check a local file and print the JSON report
    Check {
        /// Source file to check
        file: PathBuf,

        /// Pass to run: syntax or lint
        #[arg(long, default_value = "syntax")]
        pass: PassKind,

        /// Use iterative recovery (syntax pass only)
        #[arg(long)]
        recover: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    hdlcheck_core::init_tracing(cli.json, level);

    let config = ServiceConfig::from_env().context("Invalid HDLCHECK_* configuration")?;

    match cli.command {
        Commands::Serve {
            bind,
            allowed_origins,
            timeout_ms,
        } => cmd_serve(config, bind, allowed_origins, timeout_ms).await,
        Commands::Check {
            file,
            pass,
            recover,
        } => {
            let code = cmd_check(config, &file, pass, recover).await?;
            std::process::exit(code);
        }
    }
}

async fn cmd_serve(
    mut config: ServiceConfig,
    bind: Option<String>,
    allowed_origins: Vec<String>,
    timeout_ms: Option<u64>,
) -> Result<()> {
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if !allowed_origins.is_empty() {
        config.allowed_origins = allowed_origins;
    }
    if let Some(ms) = timeout_ms {
        config.timeout_ms = ms;
    }

    let bind = config.bind.clone();
    info!(
        syntax = %config.syntax.program,
        lint = %config.lint.program,
        timeout_ms = config.timeout_ms,
        "toolchain configured"
    );
    let service = DiagnosticsService::from_config(config)?;
    hdlcheck_cli::serve(Arc::new(HttpApp::new(service)), &bind).await
}

async fn cmd_check(config: ServiceConfig, file: &Path, pass: PassKind, recover: bool) -> Result<i32> {
    let code = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let service = DiagnosticsService::from_config(config)?;
    let report = service
        .handle(pass, &CheckRequest { code, recover })
        .await
        .with_context(|| format!("{pass} pass failed for {}", file.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.returncode)
}
