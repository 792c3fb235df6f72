//! Axum-based HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use chainwatch_node::{ShutdownSignal, StatusHandle, WatcherMetrics};

use crate::handlers;
use crate::service::QueryService;
use crate::RpcError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub service: QueryService,
    pub status: StatusHandle,
    /// `None` when metrics exposure is disabled.
    pub metrics: Option<Arc<WatcherMetrics>>,
}

/// Build the API router. Any origin may call it.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/currentBlock", get(handlers::current_block))
        .route("/subscribe", post(handlers::subscribe))
        .route("/transactions", get(handlers::transactions))
        .route("/status", get(handlers::status))
        .route("/metrics", get(handlers::metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct RpcServer {
    pub port: u16,
    state: ApiState,
}

impl RpcServer {
    pub fn new(port: u16, state: ApiState) -> Self {
        Self { port, state }
    }

    /// Bind to `0.0.0.0:port` and serve until `shutdown` fires.
    pub async fn serve(self, shutdown: ShutdownSignal) -> Result<(), RpcError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), RpcError> {
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "HTTP API listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP API stopped");
        Ok(())
    }
}
