//! Router behaviour without opening a socket.

use std::sync::Arc;
use std::time::Duration;

use hdlcheck_cli::{HttpApp, HttpRequest};
use hdlcheck_core::fakes::ScriptedTool;
use hdlcheck_core::{CheckError, DiagnosticsService, ServiceConfig};
use serde_json::json;
use tempfile::TempDir;
use tiny_http::Method;

fn app_with(
    tool: ScriptedTool,
    tweak: impl FnOnce(&mut ServiceConfig),
) -> (HttpApp<ScriptedTool>, Arc<ScriptedTool>, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = ServiceConfig {
        scratch_dir: Some(dir.path().to_path_buf()),
        ..ServiceConfig::default()
    };
    tweak(&mut config);
    let tool = Arc::new(tool);
    let app = HttpApp::new(DiagnosticsService::new(tool.clone(), config));
    (app, tool, dir)
}

fn post(path: &str, body: serde_json::Value) -> HttpRequest {
    HttpRequest::new(Method::Post, path).with_body(body.to_string())
}

#[tokio::test]
async fn lint_returns_normalized_report() {
    let (app, _, _dir) = app_with(
        ScriptedTool::canned(1, "f.sv:2:3: warning: unused net\n", ""),
        |_| {},
    );
    let reply = app
        .route(&post("/lint", json!({ "code": "module m;\nwire w;\nendmodule" })))
        .await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-type"), Some("application/json"));
    assert_eq!(
        reply.json_body(),
        json!({
            "errors": [{ "line": 2, "column": 3, "severity": "warning", "message": "unused net" }],
            "returncode": 1
        })
    );
}

#[tokio::test]
async fn empty_code_is_bad_request_with_detail() {
    let (app, tool, _dir) = app_with(ScriptedTool::canned(0, "", ""), |_| {});
    for path in ["/lint", "/compile"] {
        let reply = app.route(&post(path, json!({ "code": "  \n " }))).await;
        assert_eq!(reply.status, 400);
        assert_eq!(reply.json_body()["detail"], "No code provided.");
        assert_eq!(reply.json_body()["kind"], "client_input");
    }
    assert_eq!(tool.call_count(), 0);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (app, tool, _dir) = app_with(ScriptedTool::canned(0, "", ""), |_| {});
    let reply = app
        .route(&HttpRequest::new(Method::Post, "/compile").with_body("{code:"))
        .await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.json_body()["kind"], "bad_request");

    let missing_field = app.route(&post("/compile", json!({ "source": "x" }))).await;
    assert_eq!(missing_field.status, 400);
    assert_eq!(tool.call_count(), 0);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (app, tool, _dir) = app_with(ScriptedTool::canned(0, "", ""), |c| c.max_body_bytes = 64);
    let reply = app
        .route(&post("/lint", json!({ "code": "x".repeat(100) })))
        .await;
    assert_eq!(reply.status, 413);
    assert_eq!(tool.call_count(), 0);
}

#[tokio::test]
async fn compile_with_recover_flag_echoes_file_content() {
    let (app, _, _dir) = app_with(
        ScriptedTool::new(|_, text| {
            if text.contains("oops") && !text.contains("//oops") {
                hdlcheck_core::InvocationResult::new(1, "s.sv:1:1: error: oops\n", "")
            } else {
                hdlcheck_core::InvocationResult::new(0, "", "")
            }
        }),
        |_| {},
    );
    let code = "oops\nmodule m;\nendmodule\n";
    let reply = app
        .route(&post("/compile", json!({ "code": code, "recover": true })))
        .await;

    assert_eq!(reply.status, 200);
    let body = reply.json_body();
    assert_eq!(body["file_content"], code);
    assert_eq!(body["iterations"], 2);
    assert_eq!(body["stop_reason"], "clean");
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn tool_failures_map_to_server_statuses() {
    let (missing, _, _d1) = app_with(
        ScriptedTool::failing(|| CheckError::ToolUnavailable {
            tool: "verible-verilog-syntax".into(),
        }),
        |_| {},
    );
    let reply = missing.route(&post("/compile", json!({ "code": "module m;" }))).await;
    assert_eq!(reply.status, 500);
    assert_eq!(reply.json_body()["kind"], "tool_unavailable");

    let (broken, _, _d3) = app_with(
        ScriptedTool::failing(|| CheckError::Invocation {
            tool: "verible-verilog-lint".into(),
            reason: "Permission denied (os error 13)".into(),
        }),
        |_| {},
    );
    let reply = broken.route(&post("/lint", json!({ "code": "module m;" }))).await;
    assert_eq!(reply.status, 500);
    assert_eq!(reply.json_body()["kind"], "invocation");
    assert!(reply.json_body()["detail"]
        .as_str()
        .is_some_and(|d| d.contains("Permission denied")));

    let (slow, _, _d2) = app_with(
        ScriptedTool::canned(0, "", "").with_delay(Duration::from_secs(5)),
        |c| c.timeout_ms = 20,
    );
    let reply = slow.route(&post("/lint", json!({ "code": "module m;" }))).await;
    assert_eq!(reply.status, 504);
    assert_eq!(reply.json_body()["kind"], "tool_timeout");
}

#[tokio::test]
async fn health_and_metrics() {
    let (app, _, _dir) = app_with(ScriptedTool::canned(0, "", ""), |_| {});

    let health = app.route(&HttpRequest::new(Method::Get, "/health")).await;
    assert_eq!(health.status, 200);
    assert_eq!(health.json_body()["status"], "ok");
    assert_eq!(health.json_body()["version"], hdlcheck_core::VERSION);

    let metrics = app.route(&HttpRequest::new(Method::Get, "/metrics")).await;
    assert_eq!(metrics.status, 200);
    assert!(metrics.json_body()["requests_handled"].is_u64());
}

#[tokio::test]
async fn unknown_path_and_wrong_method() {
    let (app, _, _dir) = app_with(ScriptedTool::canned(0, "", ""), |_| {});

    let missing = app.route(&HttpRequest::new(Method::Get, "/format")).await;
    assert_eq!(missing.status, 404);

    let wrong = app.route(&HttpRequest::new(Method::Get, "/lint")).await;
    assert_eq!(wrong.status, 405);
    assert_eq!(wrong.header("allow"), Some("POST, OPTIONS"));

    let wrong = app.route(&HttpRequest::new(Method::Post, "/health")).await;
    assert_eq!(wrong.status, 405);
}

#[tokio::test]
async fn preflight_and_cors_headers() {
    let (app, _, _dir) = app_with(ScriptedTool::canned(0, "", ""), |c| {
        c.allowed_origins = vec!["https://ide.example".into()];
    });

    let preflight = app
        .route(&HttpRequest::new(Method::Options, "/lint").with_origin("https://ide.example"))
        .await;
    assert_eq!(preflight.status, 204);
    assert_eq!(
        preflight.header("access-control-allow-methods"),
        Some("POST, GET, OPTIONS")
    );
    assert_eq!(
        preflight.header("access-control-allow-headers"),
        Some("Content-Type")
    );
    assert_eq!(
        preflight.header("access-control-allow-origin"),
        Some("https://ide.example")
    );

    let foreign = app
        .route(
            &post("/lint", json!({ "code": "module m;" })).with_origin("https://evil.example"),
        )
        .await;
    assert_eq!(foreign.status, 200);
    assert_eq!(foreign.header("access-control-allow-origin"), None);
}

#[tokio::test]
async fn query_string_is_ignored_for_routing() {
    let (app, _, _dir) = app_with(ScriptedTool::canned(0, "", ""), |_| {});
    let reply = app.route(&HttpRequest::new(Method::Get, "/health?probe=1")).await;
    assert_eq!(reply.status, 200);
}
