//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub backend: String,
}

/// `GET /api/health`: liveness and version.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: crate::config::APP_NAME,
        version: crate::config::APP_VERSION,
        backend: ctx.backend.clone(),
    })
}
