//! API router.
//!
//! Returns a composable `Router` with every endpoint under `/api/`, wrapped in
//! a permissive CORS layer (a local browser UI is the expected client) and
//! HTTP tracing.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

pub fn api_router(ctx: ApiContext) -> Router {
    // Path params use `:param` syntax (matchit 0.7 / axum 0.7). The static
    // `/reports/export` segment takes priority over `/reports/:format`.
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/formats", get(endpoints::formats::list))
        .route(
            "/reports",
            get(endpoints::reports::snapshot).post(endpoints::reports::start),
        )
        .route("/reports/export", get(endpoints::downloads::pdf))
        .route("/reports/:format", get(endpoints::reports::entry))
        .route(
            "/reports/:format/regenerate",
            post(endpoints::reports::regenerate),
        )
        .route(
            "/reports/:format/markdown",
            get(endpoints::downloads::markdown),
        )
        .with_state(ctx);

    Router::new()
        .nest("/api", routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
