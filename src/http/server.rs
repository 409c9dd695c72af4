//! Exporter HTTP server.
//!
//! # Responsibilities
//! - Serve the metrics snapshot as exposition text and JSON
//! - Serve hub introspection stats
//! - Stop gracefully on the shutdown broadcast

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::events::{EventHub, HubStats};
use crate::metrics::{MetricsSnapshot, Registry};

const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// State injected into handlers.
#[derive(Clone)]
pub struct ExporterState {
    pub registry: Arc<Registry>,
    pub hub: Arc<EventHub>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub version: String,
    pub status: String,
    pub hub_closed: bool,
}

/// HTTP server exposing the registry and the hub.
pub struct ExporterServer {
    router: Router,
}

impl ExporterServer {
    pub fn new(registry: Arc<Registry>, hub: Arc<EventHub>) -> Self {
        let state = ExporterState { registry, hub };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: ExporterState) -> Router {
        Router::new()
            .route("/metrics", get(metrics_text))
            .route("/metrics/json", get(metrics_json))
            .route("/stats", get(hub_stats))
            .route("/health", get(health))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Exporter listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Exporter received shutdown signal");
            })
            .await?;

        tracing::info!("Exporter stopped");
        Ok(())
    }
}

async fn metrics_text(State(state): State<ExporterState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
        state.registry.export().to_text(),
    )
}

async fn metrics_json(State(state): State<ExporterState>) -> Json<MetricsSnapshot> {
    Json(state.registry.export())
}

async fn hub_stats(State(state): State<ExporterState>) -> Json<HubStats> {
    Json(state.hub.stats())
}

async fn health(State(state): State<ExporterState>) -> Json<HealthStatus> {
    let hub_closed = state.hub.is_closed();
    Json(HealthStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: if hub_closed { "draining" } else { "operational" }.to_string(),
        hub_closed,
    })
}
