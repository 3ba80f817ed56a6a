//! Stream consumer: drives one generation job to a terminal outcome.
//!
//! A consumer owns exactly one `(input, format)` job. It reads deliveries from
//! the backend, decodes frames and mirrors them into the store under the epoch
//! it was started with. Every path out of the loop leaves the entry terminal,
//! unless a newer run has taken over the format, in which case the consumer
//! stops without writing.

use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;

use super::backend::{BackendError, GenerationBackend, GenerationRequest};
use super::frame::{FrameDecoder, FrameError, StreamEvent};
use crate::report::{Epoch, GenerationTiming, ReportFormat, ReportStore, StoreError, WriteOutcome};

/// Default stall window: no delivery for this long fails the job.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(60);

// ═══════════════════════════════════════════════════════════
// State machine
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    Connecting,
    Streaming,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub enum Transition<'a> {
    FrameReceived(&'a StreamEvent),
    TransportClosed,
    TransportErrored,
}

impl ConsumerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Terminal states absorb every transition.
    pub fn advance(self, transition: Transition<'_>) -> ConsumerState {
        if self.is_terminal() {
            return self;
        }
        match transition {
            Transition::FrameReceived(StreamEvent::Complete { .. }) => Self::Completed,
            Transition::FrameReceived(StreamEvent::Error { .. }) => Self::Failed,
            Transition::FrameReceived(_) => Self::Streaming,
            Transition::TransportClosed | Transition::TransportErrored => Self::Failed,
        }
    }
}

/// How a consumer run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConsumerOutcome {
    Completed,
    Failed { error: String },
    /// A newer run owns the format; this run's writes were discarded.
    Superseded,
}

impl ConsumerOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub stall_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Consumer
// ═══════════════════════════════════════════════════════════

enum Flow {
    Continue,
    Done(ConsumerOutcome),
}

struct Run<'a> {
    store: &'a ReportStore,
    format: ReportFormat,
    epoch: Epoch,
    state: ConsumerState,
    content: String,
}

/// Run one job to completion. Never returns an error: failures become the
/// entry's `error` state and a `Failed` outcome.
pub async fn consume(
    backend: &dyn GenerationBackend,
    store: &ReportStore,
    request: &GenerationRequest,
    epoch: Epoch,
    config: &ConsumerConfig,
) -> ConsumerOutcome {
    let mut run = Run {
        store,
        format: request.format,
        epoch,
        state: ConsumerState::Connecting,
        content: String::new(),
    };

    let marked = store.mark_generating(run.format, epoch, "Connecting to generation backend");
    if let Flow::Done(outcome) = run.check_write(marked) {
        return outcome;
    }

    tracing::info!(
        format = run.format.as_str(),
        epoch = %epoch,
        backend = %backend.describe(),
        "Opening generation job"
    );

    let stall = config.stall_timeout;
    let mut body = match tokio::time::timeout(stall, backend.open(request)).await {
        Ok(Ok(body)) => body,
        Ok(Err(e)) => return run.fail(e.to_string()),
        Err(_) => return run.fail(stall_message(stall)),
    };

    let mut decoder = FrameDecoder::new();
    loop {
        match tokio::time::timeout(stall, body.next()).await {
            Err(_) => return run.fail(stall_message(stall)),
            Ok(Some(Err(e))) => return run.fail(e.to_string()),
            Ok(Some(Ok(bytes))) => {
                decoder.push(&bytes);
                while let Some(decoded) = decoder.next_event() {
                    if let Flow::Done(outcome) = run.on_decoded(decoded) {
                        return outcome;
                    }
                }
            }
            Ok(None) => {
                tracing::debug!(
                    format = run.format.as_str(),
                    unterminated = decoder.pending_len(),
                    "Job stream closed"
                );
                if let Some(decoded) = decoder.finish() {
                    if let Flow::Done(outcome) = run.on_decoded(decoded) {
                        return outcome;
                    }
                }
                run.state = run.state.advance(Transition::TransportClosed);
                return run.fail("stream closed before completion".to_string());
            }
        }
    }
}

fn stall_message(window: Duration) -> String {
    format!("no data from backend for {window:?}")
}

impl Run<'_> {
    fn on_decoded(&mut self, decoded: Result<StreamEvent, FrameError>) -> Flow {
        match decoded {
            Ok(event) => self.on_event(event),
            Err(e) => Flow::Done(self.fail(BackendError::from(e).to_string())),
        }
    }

    fn on_event(&mut self, event: StreamEvent) -> Flow {
        tracing::trace!(format = self.format.as_str(), kind = event.kind(), "Frame received");
        if self.state.is_terminal() {
            return Flow::Continue;
        }
        self.state = self.state.advance(Transition::FrameReceived(&event));

        match event {
            StreamEvent::Status { message } | StreamEvent::Heartbeat { message } => {
                let written = self.store.record_activity(self.format, self.epoch, &message);
                self.check_write(written)
            }
            StreamEvent::Content { chunk, progress } => {
                self.content.push_str(&chunk);
                let written = self
                    .store
                    .append_content(self.format, self.epoch, &chunk, progress);
                self.check_write(written)
            }
            StreamEvent::Complete {
                generation_time,
                total_time,
            } => {
                if self.content.is_empty() {
                    return Flow::Done(self.fail("completed without content".to_string()));
                }
                let timing = GenerationTiming {
                    generation_time,
                    total_time,
                };
                let written = self.store.complete(
                    self.format,
                    self.epoch,
                    std::mem::take(&mut self.content),
                    timing,
                );
                match self.check_write(written) {
                    Flow::Continue => {
                        tracing::info!(format = self.format.as_str(), "Report completed");
                        Flow::Done(ConsumerOutcome::Completed)
                    }
                    done => done,
                }
            }
            StreamEvent::Error { error } => {
                let message = if error.trim().is_empty() {
                    "generation backend reported an error".to_string()
                } else {
                    error
                };
                Flow::Done(self.fail(message))
            }
            StreamEvent::Unknown => {
                tracing::debug!(format = self.format.as_str(), "Ignoring unknown frame type");
                Flow::Continue
            }
        }
    }

    /// Map a store write result onto the loop.
    fn check_write(&mut self, written: Result<WriteOutcome, StoreError>) -> Flow {
        match written {
            Ok(WriteOutcome::Applied) => Flow::Continue,
            Ok(WriteOutcome::Stale) => {
                tracing::info!(
                    format = self.format.as_str(),
                    epoch = %self.epoch,
                    "Consumer superseded by a newer run"
                );
                Flow::Done(ConsumerOutcome::Superseded)
            }
            Err(e) => {
                tracing::error!(format = self.format.as_str(), error = %e, "Report store write failed");
                Flow::Done(self.fail(e.to_string()))
            }
        }
    }

    fn fail(&mut self, message: String) -> ConsumerOutcome {
        self.state = self.state.advance(Transition::TransportErrored);
        tracing::warn!(format = self.format.as_str(), error = %message, "Report generation failed");

        match self.store.fail(self.format, self.epoch, &message) {
            Ok(WriteOutcome::Stale) => ConsumerOutcome::Superseded,
            Ok(WriteOutcome::Applied) => ConsumerOutcome::Failed { error: message },
            Err(e) => {
                tracing::error!(format = self.format.as_str(), error = %e, "Could not record failure");
                ConsumerOutcome::Failed { error: message }
            }
        }
    }
}
