//! Report run endpoints.
//!
//! - `POST /api/reports`: start a batch
//! - `POST /api/reports/:format/regenerate`: regenerate one format
//! - `GET /api/reports`: session snapshot
//! - `GET /api/reports/:format`: one entry
//!
//! Starting a run returns 202 as soon as the consumers are spawned; callers
//! poll the snapshot for progress.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{
    parse_format, path_format, ApiContext, EntryResponse, RegenerateRequest, RunStarted,
    StartBatchRequest,
};
use crate::report::{ReportFormat, SessionSnapshot};

/// `POST /api/reports`: reset and generate the requested formats.
pub async fn start(
    State(ctx): State<ApiContext>,
    Json(req): Json<StartBatchRequest>,
) -> Result<(StatusCode, Json<RunStarted>), ApiError> {
    let formats = match req.formats {
        Some(ids) => ids
            .iter()
            .map(|id| parse_format(id))
            .collect::<Result<Vec<_>, _>>()?,
        None => ReportFormat::all().to_vec(),
    };

    let handle = ctx.orchestrator.start_batch(&req.incident_notes, &formats)?;
    let formats = handle.formats();
    ctx.detach(handle);

    let session_id = ctx.orchestrator.store().snapshot()?.session_id;
    Ok((
        StatusCode::ACCEPTED,
        Json(RunStarted {
            session_id,
            formats,
        }),
    ))
}

/// `POST /api/reports/:format/regenerate`: body is optional; without
/// `incident_notes` the last submitted notes are reused.
pub async fn regenerate(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<RunStarted>), ApiError> {
    let format = path_format(&id)?;
    let req: RegenerateRequest = if body.is_empty() {
        RegenerateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))?
    };

    let handle = match req.incident_notes.as_deref() {
        Some(notes) => ctx.orchestrator.start_single(notes, format)?,
        None => ctx.orchestrator.regenerate(format)?,
    };
    let formats = handle.formats();
    ctx.detach(handle);

    let session_id = ctx.orchestrator.store().snapshot()?.session_id;
    Ok((
        StatusCode::ACCEPTED,
        Json(RunStarted {
            session_id,
            formats,
        }),
    ))
}

/// `GET /api/reports`
pub async fn snapshot(State(ctx): State<ApiContext>) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(ctx.orchestrator.store().snapshot()?))
}

/// `GET /api/reports/:format`
pub async fn entry(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<EntryResponse>, ApiError> {
    let format = path_format(&id)?;
    let entry = ctx.orchestrator.store().get(format)?;
    Ok(Json(EntryResponse {
        format,
        label: format.label(),
        entry,
    }))
}
