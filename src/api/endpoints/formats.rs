use axum::Json;

use crate::api::types::FormatInfo;
use crate::report::ReportFormat;

/// `GET /api/formats`: every format in canonical order.
pub async fn list() -> Json<Vec<FormatInfo>> {
    Json(ReportFormat::all().iter().copied().map(FormatInfo::from).collect())
}
