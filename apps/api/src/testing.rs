//! Test doubles and an app builder shared by unit and router tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{Map, Value};
use tower::ServiceExt;

use crate::config::Config;
use crate::generation::orchestrator::Orchestrator;
use crate::generation::snapshot::SnapshotSink;
use crate::generation::token::TokenSource;
use crate::llm_client::gateway::{Completion, CompletionRequest, GatewayError, GenerationGateway};
use crate::routes::build_router;
use crate::state::AppState;

pub use crate::store::memory::MemoryStore;

// ────────────────────────────────────────────────────────────────────────────
// Gateway double
// ────────────────────────────────────────────────────────────────────────────

/// Replays queued responses in order. With an empty queue it answers every
/// request with a fenced fragment wrapped in the container id the prompt asked
/// for, so namespacing can be checked end to end.
#[derive(Default)]
pub struct MockGateway {
    responses: Mutex<VecDeque<Result<Completion, GatewayError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: &str) {
        self.push(Ok(Completion::Text(text.to_string())));
    }

    pub fn push_structured(&self, value: Value) {
        self.push(Ok(Completion::Structured(value)));
    }

    pub fn push_error(&self, error: GatewayError) {
        self.push(Err(error));
    }

    fn push(&self, response: Result<Completion, GatewayError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// The id the namespacing rules asked the container to carry.
pub fn requested_container_id(instructions: &str) -> Option<&str> {
    instructions
        .split("with id '")
        .nth(1)
        .and_then(|rest| rest.split('\'').next())
}

fn echo(request: &CompletionRequest) -> Completion {
    let container = requested_container_id(&request.instructions).unwrap_or("container");
    let fragment = |body: &str| format!("```html\n<div id=\"{container}\">{body}</div>\n```");
    match &request.output_shape {
        Some(shape) => {
            let fields: Map<String, Value> = shape
                .fields
                .iter()
                .map(|f| (f.name.to_string(), Value::String(fragment(f.name))))
                .collect();
            Completion::Structured(Value::Object(fields))
        }
        None => Completion::Text(fragment(&request.user_message)),
    }
}

#[async_trait]
impl GenerationGateway for MockGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.responses.lock().unwrap().pop_front();
        let response = scripted.unwrap_or_else(|| Ok(echo(&request)));
        self.requests.lock().unwrap().push(request);
        response
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tokens and snapshots
// ────────────────────────────────────────────────────────────────────────────

pub struct SequenceTokens {
    next: AtomicU64,
}

impl SequenceTokens {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl TokenSource for SequenceTokens {
    fn next_token(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct RecordingSnapshots {
    saved: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingSnapshots {
    pub fn failing() -> Self {
        Self {
            saved: Mutex::default(),
            fail: true,
        }
    }

    pub fn saved(&self) -> Vec<(String, String)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotSink for RecordingSnapshots {
    async fn save(&self, key: &str, html: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("bucket unreachable");
        }
        self.saved
            .lock()
            .unwrap()
            .push((key.to_string(), html.to_string()));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// App
// ────────────────────────────────────────────────────────────────────────────

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        anthropic_api_key: "test-key".to_string(),
        port: 0,
        rust_log: "debug".to_string(),
        cors_origin: None,
        max_upload_bytes: 1024 * 1024,
        s3: None,
    }
}

pub fn test_app(store: Arc<MemoryStore>, gateway: Arc<MockGateway>) -> Router {
    let orchestrator = Orchestrator::new(
        store.clone(),
        gateway,
        Arc::new(RecordingSnapshots::default()),
        Arc::new(SequenceTokens::starting_at(1_700_000_000_000)),
    );
    build_router(AppState {
        store,
        orchestrator: Arc::new(orchestrator),
        config: test_config(),
    })
}

/// Sends one request through the router and decodes the JSON envelope.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// A multipart body with one part per `(field name, content type, bytes)`.
pub fn multipart_request(uri: &str, parts: &[(&str, &str, &[u8])]) -> Request<Body> {
    const BOUNDARY: &str = "resume-api-test-boundary";
    let mut body = Vec::new();
    for (name, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}.bin\"\r\n\
                 Content-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
