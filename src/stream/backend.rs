//! Generation backend seam.
//!
//! A backend opens one generation job for `(input, format)` and hands back the
//! raw byte stream of its response. Framing is the consumer's business.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, StreamExt};
use serde::Serialize;

use super::frame::FrameError;
use crate::report::ReportFormat;

/// Raw response body, one item per transport delivery.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, BackendError>>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Cannot connect to generation backend at {0}")]
    Connection(String),

    #[error("Generation backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed frame: {0}")]
    Decode(#[from] FrameError),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// One generation job to open.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub input: Arc<str>,
    pub format: ReportFormat,
}

pub trait GenerationBackend: Send + Sync {
    /// Open a job. Resolves once the response head is in; the body follows
    /// on the returned stream.
    fn open<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<ByteStream, BackendError>>;

    /// Where jobs go, for logs and health output.
    fn describe(&self) -> String;
}

// ═══════════════════════════════════════════════════════════
// HTTP backend
// ═══════════════════════════════════════════════════════════

/// Request body for `POST /api/generate_report`.
#[derive(Serialize)]
struct GenerateReportBody<'a> {
    incident_notes: &'a str,
    format: &'a str,
}

/// Streams jobs from the report generation service over HTTP.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// No overall request timeout: a job may legitimately stream for minutes.
    /// Liveness is enforced by the consumer's stall window instead.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| BackendError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/generate_report", self.base_url)
    }

    async fn open_stream(&self, request: &GenerationRequest) -> Result<ByteStream, BackendError> {
        let body = GenerateReportBody {
            incident_notes: &request.input,
            format: request.format.as_str(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    BackendError::Connection(self.base_url.clone())
                } else {
                    BackendError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| BackendError::Transport(e.to_string()))
            })
            .boxed())
    }
}

impl GenerationBackend for HttpBackend {
    fn open<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<ByteStream, BackendError>> {
        self.open_stream(request).boxed()
    }

    fn describe(&self) -> String {
        self.endpoint()
    }
}

// ═══════════════════════════════════════════════════════════
// Scripted backend
// ═══════════════════════════════════════════════════════════

/// One step of a scripted response body.
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver these bytes as one transport chunk.
    Send(Vec<u8>),
    /// Fail the transport.
    Fail(String),
    Sleep(Duration),
    /// Block until the test releases the gate.
    Wait(Arc<tokio::sync::Notify>),
}

impl Step {
    /// A complete `data: {json}\n\n` frame in one delivery.
    pub fn event(payload: serde_json::Value) -> Step {
        Step::Send(format!("data: {payload}\n\n").into_bytes())
    }

    pub fn raw(text: &str) -> Step {
        Step::Send(text.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone)]
enum Script {
    Refuse(String),
    Body(Vec<Step>),
}

/// In-memory backend replaying per-format scripts, in order, one per `open`.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<ReportFormat, VecDeque<Script>>>,
    opened: Mutex<Vec<ReportFormat>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, format: ReportFormat, steps: Vec<Step>) -> Self {
        self.push(format, Script::Body(steps));
        self
    }

    /// The next `open` for `format` fails as a refused connection.
    pub fn with_refusal(self, format: ReportFormat, reason: &str) -> Self {
        self.push(format, Script::Refuse(reason.to_string()));
        self
    }

    /// Shorthand: status, chunked content, complete.
    pub fn with_report(self, format: ReportFormat, chunks: &[&str]) -> Self {
        let mut steps = vec![Step::event(serde_json::json!({
            "type": "status",
            "message": "Analyzing incident and generating report...",
        }))];
        steps.extend(chunks.iter().map(|chunk| {
            Step::event(serde_json::json!({ "type": "content", "chunk": chunk }))
        }));
        steps.push(Step::event(serde_json::json!({
            "type": "complete",
            "generation_time": "0.1s",
            "total_time": "0.2s",
        })));
        self.with_body(format, steps)
    }

    /// Formats opened so far, in open order.
    pub fn opened(&self) -> Vec<ReportFormat> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }

    fn push(&self, format: ReportFormat, script: Script) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.entry(format).or_default().push_back(script);
        }
    }

    fn next_script(&self, format: ReportFormat) -> Result<Script, BackendError> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(format);
        }
        self.scripts
            .lock()
            .map_err(|_| BackendError::Client("script lock poisoned".into()))?
            .get_mut(&format)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| BackendError::Connection(format!("no script for {format}")))
    }
}

impl GenerationBackend for ScriptedBackend {
    fn open<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<ByteStream, BackendError>> {
        let script = self.next_script(request.format);
        async move {
            match script? {
                Script::Refuse(reason) => Err(BackendError::Connection(reason)),
                Script::Body(steps) => Ok(replay(steps)),
            }
        }
        .boxed()
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

fn replay(steps: Vec<Step>) -> ByteStream {
    stream::unfold(steps.into_iter(), |mut steps| async move {
        loop {
            match steps.next()? {
                Step::Send(bytes) => return Some((Ok(bytes), steps)),
                Step::Fail(reason) => return Some((Err(BackendError::Transport(reason)), steps)),
                Step::Sleep(duration) => tokio::time::sleep(duration).await,
                Step::Wait(gate) => gate.notified().await,
            }
        }
    })
    .boxed()
}
