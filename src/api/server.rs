//! API server lifecycle: bind, spawn the axum server in a background task,
//! return a handle with a shutdown channel.

use std::net::SocketAddr;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::api::types::ApiContext;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind API server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("API server error: {0}")]
    Serve(#[from] std::io::Error),
    #[error("API server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Handle to a running API server.
pub struct ApiServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), std::io::Error>>,
}

impl ApiServer {
    /// Bound address (the real port when started on port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal a graceful shutdown and wait for in-flight requests to drain.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
        self.task.await??;
        Ok(())
    }
}

/// Bind `addr` and start serving the API router in the background.
pub async fn start_server(ctx: ApiContext, addr: SocketAddr) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener.local_addr()?;

    let app = api_router(ctx);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await;
        if let Err(e) = &result {
            tracing::error!("API server error: {e}");
        }
        tracing::info!("API server stopped");
        result
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::orchestrator::Orchestrator;
    use crate::report::ReportStore;
    use crate::stream::{ConsumerConfig, ScriptedBackend};

    fn test_ctx() -> ApiContext {
        let orchestrator = Orchestrator::new(
            ReportStore::new(),
            Arc::new(ScriptedBackend::new()),
            ConsumerConfig::default(),
        );
        ApiContext::new(orchestrator, "scripted")
    }

    #[tokio::test]
    async fn start_serve_and_stop() {
        let server = start_server(test_ctx(), SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("server should start");
        assert!(server.addr().port() > 0);

        let url = format!("http://{}/api/health", server.addr());
        let resp = reqwest::get(&url).await.unwrap();
        assert!(resp.status().is_success());
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["status"], "ok");

        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn bind_conflict_reported() {
        let first = start_server(test_ctx(), SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let err = start_server(test_ctx(), first.addr()).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
        first.shutdown().await.unwrap();
    }
}
