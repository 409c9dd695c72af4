//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry, hub and metrics tap from a validated config
//! - Install the `metrics` facade recorder when asked to
//! - Bind and spawn the exporter
//! - Tear everything down in reverse order
//!
//! # Design Decisions
//! - Fail fast on bind errors; the exporter is the only external resource
//! - A recorder that is already installed is not fatal (tests, embedding)
//! - The exporter starts last, so the first scrape sees a live hub

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::shutdown::Shutdown;
use crate::config::TelemetryConfig;
use crate::events::{EventHub, MetricsTap};
use crate::http::ExporterServer;
use crate::metrics::{self as telemetry_metrics, Registry};
use crate::profiling::Profiler;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind exporter on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read exporter address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// A running telemetry subsystem.
pub struct Telemetry {
    pub registry: Arc<Registry>,
    pub hub: Arc<EventHub>,
    pub profiler: Profiler,
    tap: MetricsTap,
    exporter: Option<(SocketAddr, JoinHandle<()>)>,
    shutdown: Shutdown,
}

impl Telemetry {
    /// Bring up every subsystem described by `config`.
    pub async fn start(config: &TelemetryConfig) -> Result<Self, StartupError> {
        let registry = Arc::new(match &config.metrics.default_buckets {
            Some(buckets) => Registry::with_default_buckets(buckets.clone()),
            None => Registry::new(),
        });

        if config.metrics.install_recorder {
            if let Err(e) = telemetry_metrics::install(Arc::clone(&registry)) {
                tracing::warn!(error = %e, "Facade recorder not installed");
            }
        }

        let hub = Arc::new(EventHub::new(config.hub.clone()));
        let tap = MetricsTap::spawn(&hub, Arc::clone(&registry));
        let profiler = Profiler::with_registry(Arc::clone(&registry));
        let shutdown = Shutdown::new();

        let exporter = if config.exporter.enabled {
            let address = &config.exporter.bind_address;
            let listener = TcpListener::bind(address)
                .await
                .map_err(|source| StartupError::Bind {
                    address: address.clone(),
                    source,
                })?;
            let local_addr = listener.local_addr().map_err(StartupError::LocalAddr)?;

            let server = ExporterServer::new(Arc::clone(&registry), Arc::clone(&hub));
            let signal = shutdown.subscribe();
            let handle = tokio::spawn(async move {
                if let Err(e) = server.run(listener, signal).await {
                    tracing::error!(error = %e, "Exporter failed");
                }
            });
            Some((local_addr, handle))
        } else {
            tracing::info!("Exporter disabled");
            None
        };

        Ok(Self {
            registry,
            hub,
            profiler,
            tap,
            exporter,
            shutdown,
        })
    }

    /// Address the exporter is bound to, if it is enabled.
    pub fn exporter_addr(&self) -> Option<SocketAddr> {
        self.exporter.as_ref().map(|(addr, _)| *addr)
    }

    /// Drain the hub, stop the tap, then stop the exporter.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down telemetry");

        self.hub.close().await;
        let received = self.tap.join().await;
        tracing::info!(received, "Event hub closed");

        self.shutdown.trigger();
        if let Some((_, handle)) = self.exporter {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Exporter task failed");
            }
        }

        tracing::info!("Shutdown complete");
    }
}
