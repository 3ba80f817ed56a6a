//! Orchestrator: fans one input out to a consumer per report format.
//!
//! `start_batch` / `start_single` do everything synchronous (validate, reset
//! the store, spawn one task per format) and return a [`RunHandle`]. Awaiting
//! the handle waits for every consumer to reach a terminal outcome. Consumers
//! are independent: a failing format never cancels or delays its siblings.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::report::{Epoch, ReportFormat, ReportStore, StoreError};
use crate::stream::{consume, ConsumerConfig, ConsumerOutcome, GenerationBackend, GenerationRequest};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("No incident notes provided")]
    BlankInput,

    #[error("No report formats requested")]
    NoFormats,

    #[error("Nothing to regenerate: no incident notes submitted yet")]
    NoPreviousInput,

    #[error("Report store error: {0}")]
    Store(#[from] StoreError),
}

// ═══════════════════════════════════════════════════════════
// Outcomes
// ═══════════════════════════════════════════════════════════

/// Per-format outcome of one run, keyed in canonical order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub outcomes: BTreeMap<ReportFormat, ConsumerOutcome>,
}

impl BatchOutcome {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, ConsumerOutcome::Completed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ConsumerOutcome::Failed { .. }))
    }

    pub fn superseded(&self) -> usize {
        self.count(|o| matches!(o, ConsumerOutcome::Superseded))
    }

    pub fn all_completed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.values().all(ConsumerOutcome::is_completed)
    }

    pub fn outcome(&self, format: ReportFormat) -> Option<&ConsumerOutcome> {
        self.outcomes.get(&format)
    }

    fn count(&self, pred: impl Fn(&ConsumerOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(o)).count()
    }
}

/// Spawned consumers of one run.
pub struct RunHandle {
    store: ReportStore,
    tasks: Vec<(ReportFormat, Epoch, JoinHandle<ConsumerOutcome>)>,
}

impl RunHandle {
    pub fn formats(&self) -> Vec<ReportFormat> {
        self.tasks.iter().map(|(format, _, _)| *format).collect()
    }

    /// Wait for every consumer. Never resolves early, never errors: a consumer
    /// that panicked is recorded as a failure of its own format.
    pub async fn wait(self) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (format, epoch, task) in self.tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(join_error) => {
                    let error = format!("report task aborted: {join_error}");
                    tracing::error!(format = format.as_str(), %error, "Consumer task did not finish");
                    if let Err(e) = self.store.fail(format, epoch, &error) {
                        tracing::error!(format = format.as_str(), error = %e, "Could not record failure");
                    }
                    ConsumerOutcome::Failed { error }
                }
            };
            outcome.outcomes.insert(format, result);
        }
        outcome
    }
}

// ═══════════════════════════════════════════════════════════
// Orchestrator
// ═══════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct Orchestrator {
    store: ReportStore,
    backend: Arc<dyn GenerationBackend>,
    consumer: ConsumerConfig,
}

impl Orchestrator {
    pub fn new(
        store: ReportStore,
        backend: Arc<dyn GenerationBackend>,
        consumer: ConsumerConfig,
    ) -> Self {
        Self {
            store,
            backend,
            consumer,
        }
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    /// Reset `formats` and start one consumer per format. Duplicates collapse;
    /// other formats' entries are left untouched. Must run inside a tokio runtime.
    pub fn start_batch(
        &self,
        input: &str,
        formats: &[ReportFormat],
    ) -> Result<RunHandle, OrchestratorError> {
        let input = validate_input(input)?;
        let formats: Vec<ReportFormat> = formats
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if formats.is_empty() {
            return Err(OrchestratorError::NoFormats);
        }

        let epochs = self.store.begin_batch(input.clone(), &formats)?;
        tracing::info!(
            formats = formats.len(),
            input_chars = input.chars().count(),
            "Starting report batch"
        );

        Ok(self.spawn_all(input, epochs))
    }

    /// Run a batch to completion.
    pub async fn run_batch(
        &self,
        input: &str,
        formats: &[ReportFormat],
    ) -> Result<BatchOutcome, OrchestratorError> {
        Ok(self.start_batch(input, formats)?.wait().await)
    }

    /// Reset only `format` and start its consumer. Any consumer still running
    /// for the format is superseded.
    pub fn start_single(
        &self,
        input: &str,
        format: ReportFormat,
    ) -> Result<RunHandle, OrchestratorError> {
        let input = validate_input(input)?;
        self.start_single_with(input, format)
    }

    pub async fn run_single(
        &self,
        input: &str,
        format: ReportFormat,
    ) -> Result<ConsumerOutcome, OrchestratorError> {
        let mut outcome = self.start_single(input, format)?.wait().await;
        Ok(outcome
            .outcomes
            .remove(&format)
            .unwrap_or(ConsumerOutcome::Superseded))
    }

    /// Regenerate `format` from the most recently submitted notes.
    pub fn regenerate(&self, format: ReportFormat) -> Result<RunHandle, OrchestratorError> {
        let input = self
            .store
            .last_input()?
            .ok_or(OrchestratorError::NoPreviousInput)?;
        self.start_single_with(input, format)
    }

    pub fn in_flight(&self) -> Result<BTreeSet<ReportFormat>, OrchestratorError> {
        Ok(self.store.in_flight()?)
    }

    pub fn all_completed(&self) -> Result<bool, OrchestratorError> {
        Ok(self.store.all_completed()?)
    }

    fn start_single_with(
        &self,
        input: Arc<str>,
        format: ReportFormat,
    ) -> Result<RunHandle, OrchestratorError> {
        let epoch = self.store.begin_single(input.clone(), format)?;
        tracing::info!(format = format.as_str(), epoch = %epoch, "Regenerating report");
        Ok(self.spawn_all(input, vec![(format, epoch)]))
    }

    fn spawn_all(&self, input: Arc<str>, epochs: Vec<(ReportFormat, Epoch)>) -> RunHandle {
        let tasks = epochs
            .into_iter()
            .map(|(format, epoch)| {
                let request = GenerationRequest {
                    input: input.clone(),
                    format,
                };
                let backend = self.backend.clone();
                let store = self.store.clone();
                let config = self.consumer.clone();
                let span = tracing::info_span!("report", format = format.as_str(), epoch = %epoch);
                let task = tokio::spawn(
                    async move { consume(backend.as_ref(), &store, &request, epoch, &config).await }
                        .instrument(span),
                );
                (format, epoch, task)
            })
            .collect();

        RunHandle {
            store: self.store.clone(),
            tasks,
        }
    }
}

fn validate_input(input: &str) -> Result<Arc<str>, OrchestratorError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(OrchestratorError::BlankInput);
    }
    Ok(Arc::from(trimmed))
}
