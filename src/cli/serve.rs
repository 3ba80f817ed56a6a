//! `serve`: run the HTTP API until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Args;

use crate::api::{start_server, ApiContext};
use crate::cli::CliError;
use crate::config::AppConfig;
use crate::orchestrator::Orchestrator;
use crate::report::ReportStore;
use crate::stream::{GenerationBackend, HttpBackend};

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on (default: INCIDENT_API_ADDR or 127.0.0.1:8080)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,
}

pub async fn execute(args: ServeArgs, config: &AppConfig) -> Result<(), CliError> {
    let backend = HttpBackend::new(&config.backend_url, config.connect_timeout)?;
    let description = backend.describe();
    let orchestrator = Orchestrator::new(
        ReportStore::new(),
        Arc::new(backend),
        config.consumer_config(),
    );

    let addr = args.bind.unwrap_or(config.api_addr);
    let server = start_server(ApiContext::new(orchestrator, description.clone()), addr).await?;
    println!("Listening on http://{} (backend: {description})", server.addr());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received");
    server.shutdown().await?;
    Ok(())
}
