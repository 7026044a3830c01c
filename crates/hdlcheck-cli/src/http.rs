//! HTTP front end.
//!
//! [`HttpApp::route`] maps a decoded request onto the diagnostics service and
//! never touches a socket, so routing is testable in-process. [`serve`] wires
//! it to a `tiny_http` listener: the accept loop runs on a blocking thread and
//! every request is handed to the tokio runtime, so a slow tool run never
//! holds up other requests.

use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use hdlcheck_core::{
    CheckError, CheckRequest, DiagnosticsService, DiagnosticsTool, PassKind, METRICS, VERSION,
};
use serde::Serialize;
use serde_json::json;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};

const ALLOW_METHODS: &str = "POST, GET, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type";

/// Request as seen by the router.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub origin: Option<String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            origin: None,
            body: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Status, headers and body to write back.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpReply {
    fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                headers: vec![("Content-Type".into(), "application/json".into())],
                body,
            },
            Err(e) => Self::error(500, "internal", &e.to_string()),
        }
    }

    fn error(status: u16, kind: &str, detail: &str) -> Self {
        let body = json!({ "detail": detail, "kind": kind }).to_string().into_bytes();
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body,
        }
    }

    fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// First header value named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as JSON; `Value::Null` when empty or not JSON.
    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Origins allowed to call the service from a browser.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    fn allows_any(&self) -> bool {
        self.allowed.iter().any(|o| o == "*")
    }

    /// Value for `Access-Control-Allow-Origin`, if the origin is allowed.
    pub fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        match origin {
            Some(o) if self.allows_any() || self.allowed.iter().any(|a| a == o) => {
                Some(o.to_string())
            }
            None if self.allows_any() => Some("*".to_string()),
            _ => None,
        }
    }

    fn decorate(&self, reply: HttpReply, origin: Option<&str>) -> HttpReply {
        match self.allow_origin(origin) {
            Some(value) if value == "*" => reply.with_header("Access-Control-Allow-Origin", value),
            Some(value) => reply
                .with_header("Access-Control-Allow-Origin", value)
                .with_header("Vary", "Origin"),
            None => reply,
        }
    }
}

/// HTTP status for a failed check.
pub fn status_for(error: &CheckError) -> u16 {
    match error {
        e if e.is_client_error() => 400,
        CheckError::ToolTimeout { .. } => 504,
        _ => 500,
    }
}

/// Router over a [`DiagnosticsService`].
pub struct HttpApp<T: ?Sized> {
    service: DiagnosticsService<T>,
    cors: CorsPolicy,
    max_body_bytes: usize,
}

impl<T> HttpApp<T>
where
    T: DiagnosticsTool + ?Sized,
{
    pub fn new(service: DiagnosticsService<T>) -> Self {
        let cors = CorsPolicy::new(service.config().allowed_origins.clone());
        let max_body_bytes = service.config().max_body_bytes;
        Self {
            service,
            cors,
            max_body_bytes,
        }
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Produce the reply for `request`.
    pub async fn route(&self, request: &HttpRequest) -> HttpReply {
        let path = request.path.split('?').next().unwrap_or_default();

        let reply = match (&request.method, path) {
            (Method::Options, _) => HttpReply::empty(204)
                .with_header("Access-Control-Allow-Methods", ALLOW_METHODS)
                .with_header("Access-Control-Allow-Headers", ALLOW_HEADERS),
            (Method::Post, "/lint") => self.check(PassKind::Lint, &request.body).await,
            (Method::Post, "/compile") => self.check(PassKind::Syntax, &request.body).await,
            (Method::Get, "/health") => {
                HttpReply::json(200, &json!({ "status": "ok", "version": VERSION }))
            }
            (Method::Get, "/metrics") => HttpReply::json(200, &METRICS.snapshot()),
            (_, "/lint" | "/compile") => method_not_allowed("POST, OPTIONS"),
            (_, "/health" | "/metrics") => method_not_allowed("GET, OPTIONS"),
            _ => HttpReply::error(404, "not_found", &format!("no route for {path}")),
        };

        self.cors.decorate(reply, request.origin.as_deref())
    }

    async fn check(&self, pass: PassKind, body: &[u8]) -> HttpReply {
        if body.len() > self.max_body_bytes {
            return HttpReply::error(
                413,
                "payload_too_large",
                &format!("request body exceeds {} bytes", self.max_body_bytes),
            );
        }
        let request: CheckRequest = match serde_json::from_slice(body) {
            Ok(r) => r,
            Err(e) => return HttpReply::error(400, "bad_request", &format!("invalid JSON body: {e}")),
        };

        match self.service.handle(pass, &request).await {
            Ok(report) => HttpReply::json(200, &report),
            Err(e) => HttpReply::error(status_for(&e), e.kind(), &e.to_string()),
        }
    }
}

fn method_not_allowed(allow: &str) -> HttpReply {
    HttpReply::error(405, "method_not_allowed", "method not allowed").with_header("Allow", allow)
}

/// Listen on `bind` until Ctrl-C.
pub async fn serve<T>(app: Arc<HttpApp<T>>, bind: &str) -> Result<()>
where
    T: DiagnosticsTool + ?Sized + 'static,
{
    let server = Arc::new(Server::http(bind).map_err(|e| anyhow!("failed to bind {bind}: {e}"))?);
    info!(bind, version = VERSION, "hdlcheck listening");

    let runtime = tokio::runtime::Handle::current();
    let mut accept = {
        let server = Arc::clone(&server);
        tokio::task::spawn_blocking(move || {
            for request in server.incoming_requests() {
                runtime.spawn(dispatch(Arc::clone(&app), request));
            }
        })
    };

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("shutting down");
            server.unblock();
            accept.await?;
        }
        finished = &mut accept => finished?,
    }

    METRICS.flush();
    Ok(())
}

async fn dispatch<T>(app: Arc<HttpApp<T>>, request: Request)
where
    T: DiagnosticsTool + ?Sized + 'static,
{
    let started = Instant::now();
    let limit = app.max_body_bytes() as u64 + 1;

    let read = tokio::task::spawn_blocking(move || {
        let mut request = request;
        let mut body = Vec::new();
        let read = request.as_reader().take(limit).read_to_end(&mut body);
        (request, read.map(|_| body))
    })
    .await;

    let (request, body) = match read {
        Ok((request, Ok(body))) => (request, body),
        Ok((request, Err(e))) => {
            debug!(error = %e, "failed to read request body");
            respond(request, HttpReply::error(400, "bad_request", "unreadable request body")).await;
            return;
        }
        Err(e) => {
            warn!(error = %e, "request reader task failed");
            return;
        }
    };

    let routed = HttpRequest {
        method: request.method().clone(),
        path: request.url().to_string(),
        origin: request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Origin"))
            .map(|h| h.value.as_str().to_string()),
        body,
    };

    let reply = app.route(&routed).await;
    info!(
        method = %routed.method,
        path = %routed.path,
        status = reply.status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request served"
    );
    respond(request, reply).await;
}

async fn respond(request: Request, reply: HttpReply) {
    let outcome = tokio::task::spawn_blocking(move || {
        let mut response = Response::from_data(reply.body).with_status_code(reply.status);
        for (name, value) in &reply.headers {
            if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                response.add_header(header);
            }
        }
        request.respond(response)
    })
    .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "client went away before the reply was written"),
        Err(e) => warn!(error = %e, "response writer task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_echoes_origin() {
        let cors = CorsPolicy::new(vec!["*".into()]);
        assert_eq!(
            cors.allow_origin(Some("https://ide.example")).as_deref(),
            Some("https://ide.example")
        );
        assert_eq!(cors.allow_origin(None).as_deref(), Some("*"));
    }

    #[test]
    fn test_exact_origin_list() {
        let cors = CorsPolicy::new(vec!["https://ide.example".into()]);
        assert!(cors.allow_origin(Some("https://ide.example")).is_some());
        assert!(cors.allow_origin(Some("https://evil.example")).is_none());
        assert!(cors.allow_origin(None).is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&CheckError::EmptySubmission), 400);
        assert_eq!(status_for(&CheckError::MissingModuleDeclaration), 400);
        assert_eq!(
            status_for(&CheckError::ToolTimeout {
                tool: "t".into(),
                limit_ms: 1
            }),
            504
        );
        assert_eq!(
            status_for(&CheckError::ToolUnavailable { tool: "t".into() }),
            500
        );
    }
}
