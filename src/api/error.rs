//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::export::ExportError;
use crate::orchestrator::OrchestratorError;
use crate::report::StoreError;

/// Error response body: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("No incident notes provided")]
    BlankInput,
    #[error("Unknown report format: {0}")]
    UnknownFormat(String),
    #[error("Report not ready: {0}")]
    NotReady(String),
    #[error("Nothing to regenerate")]
    NoPreviousInput,
    #[error("Export failed: {0}")]
    ExportFailed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                detail.clone(),
            ),
            ApiError::BlankInput => (
                StatusCode::BAD_REQUEST,
                "BLANK_INPUT",
                "No incident notes provided".to_string(),
            ),
            ApiError::UnknownFormat(id) => (
                StatusCode::NOT_FOUND,
                "UNKNOWN_FORMAT",
                format!("Unknown report format: {id}"),
            ),
            ApiError::NotReady(detail) => (
                StatusCode::CONFLICT,
                "NOT_READY",
                detail.clone(),
            ),
            ApiError::NoPreviousInput => (
                StatusCode::CONFLICT,
                "NO_PREVIOUS_INPUT",
                "No incident notes submitted yet; send incident_notes".to_string(),
            ),
            ApiError::ExportFailed(detail) => {
                tracing::error!(detail, "Export failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EXPORT_FAILED",
                    detail.clone(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::BlankInput => ApiError::BlankInput,
            OrchestratorError::NoFormats => {
                ApiError::BadRequest("At least one report format is required".into())
            }
            OrchestratorError::NoPreviousInput => ApiError::NoPreviousInput,
            OrchestratorError::Store(e) => e.into(),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::NotReady { .. }
            | ExportError::NothingRequested
            | ExportError::NotCompleted(_) => ApiError::NotReady(err.to_string()),
            ExportError::Sanitize { .. } | ExportError::Render(_) | ExportError::Io(_) => {
                ApiError::ExportFailed(err.to_string())
            }
            ExportError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportFormat;

    #[test]
    fn orchestrator_errors_map_to_client_statuses() {
        let status = |e: OrchestratorError| ApiError::from(e).into_response().status();
        assert_eq!(status(OrchestratorError::BlankInput), StatusCode::BAD_REQUEST);
        assert_eq!(status(OrchestratorError::NoFormats), StatusCode::BAD_REQUEST);
        assert_eq!(status(OrchestratorError::NoPreviousInput), StatusCode::CONFLICT);
        assert_eq!(
            status(OrchestratorError::Store(StoreError::LockPoisoned)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn export_preconditions_are_conflicts() {
        let err = ApiError::from(ExportError::NotReady {
            pending: vec![ReportFormat::Resolution],
        });
        assert!(err.to_string().contains("resolution"));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);

        let err = ApiError::from(ExportError::NotCompleted(ReportFormat::ActionItems));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn render_failure_is_server_error() {
        let err = ApiError::from(ExportError::Render("font".into()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unknown_format_is_not_found() {
        let response = ApiError::UnknownFormat("haiku".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
