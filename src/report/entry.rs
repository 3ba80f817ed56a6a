//! Per-format report entry and its lifecycle status.

use serde::{Deserialize, Serialize};

/// Lifecycle of one format's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Pending,
    Generating,
    Completed,
    Error,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// `completed` and `error` end a generation run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Legal transitions within one generation run. A reset to `pending`
    /// is not a transition; it starts a new run.
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Generating)
                | (Self::Generating, Self::Generating)
                | (Self::Generating, Self::Completed)
                | (Self::Generating, Self::Error)
        )
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory timing metadata carried by the backend's `complete` frame.
/// Opaque display strings (e.g. "12.3s").
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationTiming {
    pub generation_time: Option<String>,
    pub total_time: Option<String>,
}

/// Status, accumulated text and optional error for one format.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportEntry {
    pub status: ReportStatus,
    /// Concatenation of every content chunk received in the current run.
    pub content: String,
    /// Set only while `status == Error`.
    pub error: Option<String>,
    /// Last status / heartbeat message from the backend. Display only.
    pub activity: Option<String>,
    /// Last progress string from a content frame. Display only.
    pub progress: Option<String>,
    pub timing: Option<GenerationTiming>,
}

impl ReportEntry {
    pub fn is_completed(&self) -> bool {
        self.status == ReportStatus::Completed
    }
}

/// Generation token for one format. Bumped on every reset; writes carrying an
/// older epoch are discarded by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Epoch(pub u64);

impl Epoch {
    pub fn next(self) -> Epoch {
        Epoch(self.0 + 1)
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
