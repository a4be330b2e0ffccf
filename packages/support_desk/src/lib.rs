// Library interface for support_desk
// Exposes the router and server loop so they can be embedded or driven from tests

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod protocol;
pub mod ws;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use pairing_broker::BrokerHandle;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;

#[derive(Clone)]
pub struct AppState {
    pub broker: BrokerHandle,
    pub metrics: Arc<ServerMetrics>,
    pub config: Arc<ServerConfig>,
    /// Cancelled once the server starts shutting down; every socket task
    /// closes its connection when it fires
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            broker: BrokerHandle::new(),
            metrics: Arc::new(ServerMetrics::new()),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/stats", get(handlers::stats))
        .route("/ws", get(handlers::websocket_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves.
///
/// On shutdown the broker drops every registered connection and refuses new
/// ones, then the shared token closes every socket still open, registered or
/// not, before axum drains the listener.
pub async fn serve<F>(listener: tokio::net::TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let broker = state.broker.clone();
    let sockets = state.shutdown.clone();
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested, dropping all connections");
            broker.shutdown().await;
            sockets.cancel();
        })
        .await
        .context("Server error")?;

    Ok(())
}
