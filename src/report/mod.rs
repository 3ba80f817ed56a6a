//! Report model: format identifiers, per-format entries, and the shared store.

pub mod entry;
pub mod format;
pub mod store;

pub use entry::{Epoch, GenerationTiming, ReportEntry, ReportStatus};
pub use format::ReportFormat;
pub use store::{ReportStore, SessionSnapshot, StoreError, WriteOutcome};
