//! HTTP status endpoints
//!
//! A small Axum server exposing liveness and queue/strategy status for
//! orchestration probes and operators.

use crate::service::app::AppState;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Status server for liveness probes and queue inspection
pub struct HealthServer {
    config: HealthServerConfig,
    app_state: Arc<AppState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, app_state: Arc<AppState>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            app_state,
            shutdown_tx,
        }
    }

    /// Serve until a stop signal arrives
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr).await?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/queues", get(queues_handler))
            .route("/strategies", get(strategies_handler))
            .with_state(self.app_state.clone())
    }

    /// Signal the server to stop
    pub fn stop(&self) {
        if self.shutdown_tx.send(()).is_err() {
            warn!("Health server was not running when stop was requested");
        }
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "rally-point",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/queues", "/strategies"]
    }))
}

async fn health_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");

    if app_state.is_running().await {
        (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": app_state.config().service.name,
                "version": env!("CARGO_PKG_VERSION")
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy" })),
        )
    }
}

async fn queues_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.queue_snapshots().await)
}

async fn strategies_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.strategies().configs().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HealthServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
    }
}
