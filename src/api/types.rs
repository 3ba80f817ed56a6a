//! Shared state and request/response payloads for the API layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::orchestrator::{Orchestrator, RunHandle};
use crate::report::{ReportEntry, ReportFormat};

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub orchestrator: Orchestrator,
    /// Human-readable backend description for the health endpoint.
    pub backend: String,
}

impl ApiContext {
    pub fn new(orchestrator: Orchestrator, backend: impl Into<String>) -> Self {
        Self {
            orchestrator,
            backend: backend.into(),
        }
    }

    /// Let a started run finish in the background; the store carries its
    /// progress, so the handle is only awaited for the summary log.
    pub fn detach(&self, handle: RunHandle) {
        tokio::spawn(async move {
            let outcome = handle.wait().await;
            tracing::info!(
                completed = outcome.completed(),
                failed = outcome.failed(),
                superseded = outcome.superseded(),
                "Report run finished"
            );
        });
    }
}

/// Parse a format identifier from a request body.
pub fn parse_format(id: &str) -> Result<ReportFormat, ApiError> {
    ReportFormat::from_str(id.trim())
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown report format: {id}")))
}

/// Parse a format identifier from a path segment.
pub fn path_format(id: &str) -> Result<ReportFormat, ApiError> {
    ReportFormat::from_str(id).ok_or_else(|| ApiError::UnknownFormat(id.to_string()))
}

// ═══════════════════════════════════════════════════════════
// Payloads
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct StartBatchRequest {
    pub incident_notes: String,
    /// Format identifiers; every format when omitted.
    #[serde(default)]
    pub formats: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegenerateRequest {
    /// New notes; the last submitted notes are reused when absent.
    #[serde(default)]
    pub incident_notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunStarted {
    pub session_id: Uuid,
    pub formats: Vec<ReportFormat>,
}

#[derive(Debug, Serialize)]
pub struct FormatInfo {
    pub id: ReportFormat,
    pub label: &'static str,
    pub description: &'static str,
}

impl From<ReportFormat> for FormatInfo {
    fn from(format: ReportFormat) -> Self {
        Self {
            id: format,
            label: format.label(),
            description: format.description(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub format: ReportFormat,
    pub label: &'static str,
    #[serde(flatten)]
    pub entry: ReportEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_and_path_formats_fail_differently() {
        assert_eq!(parse_format(" resolution ").unwrap(), ReportFormat::Resolution);
        assert!(matches!(parse_format("haiku"), Err(ApiError::BadRequest(_))));
        assert!(matches!(path_format("haiku"), Err(ApiError::UnknownFormat(_))));
    }

    #[test]
    fn start_request_formats_optional() {
        let req: StartBatchRequest =
            serde_json::from_str(r#"{"incident_notes": "db down"}"#).unwrap();
        assert!(req.formats.is_none());
    }

    #[test]
    fn entry_response_flattens_entry() {
        let body = EntryResponse {
            format: ReportFormat::ActionItems,
            label: ReportFormat::ActionItems.label(),
            entry: ReportEntry::default(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["format"], "action_items");
        assert_eq!(json["status"], "pending");
    }
}
