//! Report State Store: the single source of truth for per-format entries.
//!
//! All formats live in one session behind a single `Mutex`, so every mutation
//! from every consumer task is serialized through the same point. Each format
//! carries an epoch: starting a run for a format bumps it, and writes tagged
//! with an older epoch are discarded. A superseded consumer can therefore keep
//! running without ever touching the entry of the run that replaced it.
//!
//! Readers either poll `snapshot()` or wait on `subscribe()`, a revision
//! counter bumped after every mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use super::entry::{Epoch, GenerationTiming, ReportEntry, ReportStatus};
use super::format::ReportFormat;

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Report store lock poisoned")]
    LockPoisoned,

    #[error("Invalid status transition for {format}: {from} -> {to}")]
    InvalidTransition {
        format: ReportFormat,
        from: ReportStatus,
        to: ReportStatus,
    },

    #[error("Cannot mark {0} completed without content")]
    EmptyCompletion(ReportFormat),
}

/// Result of a tagged write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The write carried an epoch older than the format's current one and was
    /// dropped without effect.
    Stale,
}

// ═══════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Slot {
    entry: ReportEntry,
    epoch: Epoch,
}

#[derive(Debug)]
struct GenerationSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    input: Option<Arc<str>>,
    slots: BTreeMap<ReportFormat, Slot>,
    requested: BTreeSet<ReportFormat>,
    in_flight: BTreeSet<ReportFormat>,
}

impl GenerationSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            input: None,
            slots: ReportFormat::all()
                .iter()
                .map(|f| (*f, Slot::default()))
                .collect(),
            requested: BTreeSet::new(),
            in_flight: BTreeSet::new(),
        }
    }

    fn slot(&self, format: ReportFormat) -> &Slot {
        // Every format is inserted at construction and never removed.
        &self.slots[&format]
    }

    fn slot_mut(&mut self, format: ReportFormat) -> &mut Slot {
        self.slots.entry(format).or_default()
    }

    /// Back to the default entry under a fresh epoch.
    fn reset(&mut self, format: ReportFormat) -> Epoch {
        let slot = self.slot_mut(format);
        slot.epoch = slot.epoch.next();
        slot.entry = ReportEntry::default();
        self.in_flight.remove(&format);
        self.slot(format).epoch
    }

    /// Mutable entry for a tagged write, or `None` if the tag is stale.
    fn entry_for_write(&mut self, format: ReportFormat, epoch: Epoch) -> Option<&mut ReportEntry> {
        let slot = self.slot_mut(format);
        if slot.epoch != epoch {
            tracing::debug!(
                format = format.as_str(),
                write_epoch = %epoch,
                current_epoch = %slot.epoch,
                "Discarding stale write"
            );
            return None;
        }
        Some(&mut slot.entry)
    }

    fn all_completed(&self) -> bool {
        !self.requested.is_empty()
            && self
                .requested
                .iter()
                .all(|f| self.slot(*f).entry.is_completed())
    }
}

fn check_transition(
    format: ReportFormat,
    entry: &ReportEntry,
    to: ReportStatus,
) -> Result<(), StoreError> {
    if entry.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            format,
            from: entry.status,
            to,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Snapshot
// ═══════════════════════════════════════════════════════════

/// Point-in-time copy of the whole session for readers (API, exporter, CLI).
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Requested formats in canonical order.
    pub requested: Vec<ReportFormat>,
    pub in_flight: Vec<ReportFormat>,
    pub all_completed: bool,
    pub entries: BTreeMap<ReportFormat, ReportEntry>,
}

impl SessionSnapshot {
    pub fn entry(&self, format: ReportFormat) -> ReportEntry {
        self.entries.get(&format).cloned().unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════
// ReportStore
// ═══════════════════════════════════════════════════════════

struct StoreInner {
    session: Mutex<GenerationSession>,
    revision: watch::Sender<u64>,
}

/// Shared handle to the report state. Cheap to clone.
#[derive(Clone)]
pub struct ReportStore {
    inner: Arc<StoreInner>,
}

impl ReportStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                session: Mutex::new(GenerationSession::new()),
                revision,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, GenerationSession>, StoreError> {
        self.inner.session.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Run a mutation under the lock, then notify subscribers.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut GenerationSession) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let result = {
            let mut session = self.lock()?;
            f(&mut *session)?
        };
        self.inner.revision.send_modify(|rev| *rev += 1);
        Ok(result)
    }

    // ── Run bookkeeping ─────────────────────────────────────

    /// Start a new batch: fresh session id, `formats` become the requested set,
    /// each is reset under a new epoch and marked in flight. Entries for other
    /// formats are left as they are.
    pub fn begin_batch(
        &self,
        input: Arc<str>,
        formats: &[ReportFormat],
    ) -> Result<Vec<(ReportFormat, Epoch)>, StoreError> {
        self.mutate(|session| {
            session.id = Uuid::new_v4();
            session.started_at = Utc::now();
            session.input = Some(input);
            session.requested = formats.iter().copied().collect();
            Ok(formats
                .iter()
                .map(|&format| {
                    let epoch = session.reset(format);
                    session.in_flight.insert(format);
                    (format, epoch)
                })
                .collect())
        })
    }

    /// Start a regeneration run for one format. Only that entry is reset.
    pub fn begin_single(&self, input: Arc<str>, format: ReportFormat) -> Result<Epoch, StoreError> {
        self.mutate(|session| {
            session.input = Some(input);
            session.requested.insert(format);
            let epoch = session.reset(format);
            session.in_flight.insert(format);
            Ok(epoch)
        })
    }

    /// Return `format` to the default entry. Any consumer still holding the
    /// previous epoch loses write access.
    pub fn reset(&self, format: ReportFormat) -> Result<Epoch, StoreError> {
        self.mutate(|session| Ok(session.reset(format)))
    }

    // ── Tagged writes ───────────────────────────────────────

    /// Replace the entry wholesale, subject to epoch and transition checks.
    pub fn set(
        &self,
        format: ReportFormat,
        epoch: Epoch,
        entry: ReportEntry,
    ) -> Result<WriteOutcome, StoreError> {
        self.mutate(|session| {
            let Some(current) = session.entry_for_write(format, epoch) else {
                return Ok(WriteOutcome::Stale);
            };
            check_transition(format, current, entry.status)?;
            if entry.status == ReportStatus::Completed && entry.content.is_empty() {
                return Err(StoreError::EmptyCompletion(format));
            }
            let terminal = entry.status.is_terminal();
            *current = entry;
            if terminal {
                session.in_flight.remove(&format);
            }
            Ok(WriteOutcome::Applied)
        })
    }

    /// Hot path: append one chunk; status becomes (or stays) `generating`.
    pub fn append_content(
        &self,
        format: ReportFormat,
        epoch: Epoch,
        chunk: &str,
        progress: Option<String>,
    ) -> Result<WriteOutcome, StoreError> {
        self.mutate(|session| {
            let Some(entry) = session.entry_for_write(format, epoch) else {
                return Ok(WriteOutcome::Stale);
            };
            check_transition(format, entry, ReportStatus::Generating)?;
            entry.status = ReportStatus::Generating;
            entry.content.push_str(chunk);
            if progress.is_some() {
                entry.progress = progress;
            }
            Ok(WriteOutcome::Applied)
        })
    }

    /// `pending -> generating` before the backend connection is opened.
    pub fn mark_generating(
        &self,
        format: ReportFormat,
        epoch: Epoch,
        activity: &str,
    ) -> Result<WriteOutcome, StoreError> {
        self.mutate(|session| {
            let Some(entry) = session.entry_for_write(format, epoch) else {
                return Ok(WriteOutcome::Stale);
            };
            check_transition(format, entry, ReportStatus::Generating)?;
            entry.status = ReportStatus::Generating;
            entry.activity = Some(activity.to_string());
            Ok(WriteOutcome::Applied)
        })
    }

    /// Update the display-only activity message. Content and status are untouched.
    pub fn record_activity(
        &self,
        format: ReportFormat,
        epoch: Epoch,
        message: &str,
    ) -> Result<WriteOutcome, StoreError> {
        self.mutate(|session| {
            let Some(entry) = session.entry_for_write(format, epoch) else {
                return Ok(WriteOutcome::Stale);
            };
            check_transition(format, entry, ReportStatus::Generating)?;
            entry.activity = Some(message.to_string());
            Ok(WriteOutcome::Applied)
        })
    }

    /// Terminal success with the full content.
    pub fn complete(
        &self,
        format: ReportFormat,
        epoch: Epoch,
        content: String,
        timing: GenerationTiming,
    ) -> Result<WriteOutcome, StoreError> {
        self.mutate(|session| {
            let Some(entry) = session.entry_for_write(format, epoch) else {
                return Ok(WriteOutcome::Stale);
            };
            check_transition(format, entry, ReportStatus::Completed)?;
            if content.is_empty() {
                return Err(StoreError::EmptyCompletion(format));
            }
            entry.status = ReportStatus::Completed;
            entry.content = content;
            entry.error = None;
            entry.activity = Some(completion_message(&timing));
            entry.timing = Some(timing);
            session.in_flight.remove(&format);
            Ok(WriteOutcome::Applied)
        })
    }

    /// Terminal failure. Partial content is kept for inspection.
    pub fn fail(
        &self,
        format: ReportFormat,
        epoch: Epoch,
        message: &str,
    ) -> Result<WriteOutcome, StoreError> {
        self.mutate(|session| {
            let Some(entry) = session.entry_for_write(format, epoch) else {
                return Ok(WriteOutcome::Stale);
            };
            check_transition(format, entry, ReportStatus::Error)?;
            entry.status = ReportStatus::Error;
            entry.error = Some(message.to_string());
            entry.activity = Some(format!("Error: {message}"));
            session.in_flight.remove(&format);
            Ok(WriteOutcome::Applied)
        })
    }

    // ── Reads ───────────────────────────────────────────────

    /// Current entry, or the default `pending` entry if never started.
    pub fn get(&self, format: ReportFormat) -> Result<ReportEntry, StoreError> {
        Ok(self.lock()?.slot(format).entry.clone())
    }

    #[cfg(test)]
    pub(crate) fn current_epoch(&self, format: ReportFormat) -> Result<Epoch, StoreError> {
        Ok(self.lock()?.slot(format).epoch)
    }

    pub fn in_flight(&self) -> Result<BTreeSet<ReportFormat>, StoreError> {
        Ok(self.lock()?.in_flight.clone())
    }

    pub fn requested(&self) -> Result<BTreeSet<ReportFormat>, StoreError> {
        Ok(self.lock()?.requested.clone())
    }

    /// True when at least one format was requested and every requested format
    /// is `completed`. Gates the exporter.
    pub fn all_completed(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.all_completed())
    }

    /// Input text of the most recent run, reused by regeneration.
    pub fn last_input(&self) -> Result<Option<Arc<str>>, StoreError> {
        Ok(self.lock()?.input.clone())
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, StoreError> {
        let session = self.lock()?;
        Ok(SessionSnapshot {
            session_id: session.id,
            started_at: session.started_at,
            requested: session.requested.iter().copied().collect(),
            in_flight: session.in_flight.iter().copied().collect(),
            all_completed: session.all_completed(),
            entries: session
                .slots
                .iter()
                .map(|(format, slot)| (*format, slot.entry.clone()))
                .collect(),
        })
    }

    /// Revision counter bumped after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }
}

impl Default for ReportStore {
    fn default() -> Self {
        Self::new()
    }
}

fn completion_message(timing: &GenerationTiming) -> String {
    match (&timing.generation_time, &timing.total_time) {
        (Some(generation), Some(total)) => format!("Generated in {generation} (total {total})"),
        (Some(generation), None) => format!("Generated in {generation}"),
        (None, Some(total)) => format!("Completed in {total}"),
        (None, None) => "Completed".to_string(),
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
