//! HTTP API over the orchestrator and exporter.
//!
//! JSON endpoints nested under `/api/`: start a batch, regenerate one format,
//! poll the session, and download the markdown or PDF exports. The router is
//! composable; `server` binds it to a listener.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer, ServerError};
pub use types::ApiContext;
