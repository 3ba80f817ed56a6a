//! Export downloads: the PDF package and per-format markdown.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{path_format, ApiContext};
use crate::export;

fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{filename}\"")
}

/// `GET /api/reports/export`: 409 until every requested format is completed.
pub async fn pdf(State(ctx): State<ApiContext>) -> Result<Response, ApiError> {
    let snapshot = ctx.orchestrator.store().snapshot()?;
    let today = chrono::Local::now().date_naive();

    // Sanitizing and rendering is CPU-bound.
    let package = tokio::task::spawn_blocking(move || export::export_all(&snapshot, today))
        .await
        .map_err(|e| ApiError::Internal(format!("export task failed: {e}")))??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&package.filename)),
        ],
        package.bytes,
    )
        .into_response())
}

/// `GET /api/reports/:format/markdown`: raw generated markdown.
pub async fn markdown(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let format = path_format(&id)?;
    let snapshot = ctx.orchestrator.store().snapshot()?;
    let today = chrono::Local::now().date_naive();
    let md = export::export_markdown(&snapshot, format, today)?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "text/markdown; charset=utf-8".to_string(),
            ),
            (header::CONTENT_DISPOSITION, attachment(&md.filename)),
        ],
        md.content,
    )
        .into_response())
}
