//! Process-wide logging and metrics setup.
//!
//! The pipeline only emits through the `tracing` and `metrics` facades;
//! binaries embedding the server decide where that output goes by calling
//! [`try_init_tracing`] and, optionally, [`install_metrics_exporter`].

use std::net::SocketAddr;

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log line encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and falls back to `info`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn try_init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Plain => registry.with(fmt::layer().with_target(true)).try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()?,
    }
    Ok(())
}

/// Installs the Prometheus recorder and serves `/metrics` on `addr`.
///
/// Must be called from inside a Tokio runtime.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or `addr` cannot be
/// bound.
pub fn install_metrics_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics exporter: {e}"))?;
    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "gatehouse_requests_total",
        "Admin API requests by operation and outcome"
    );
    describe_counter!(
        "gatehouse_gate_rejections_total",
        "Requests rejected by a pipeline gate"
    );
    describe_counter!("gatehouse_cache_hits_total", "Responses served from cache");
    describe_counter!(
        "gatehouse_cache_misses_total",
        "Cacheable requests that reached the handler"
    );
    describe_histogram!(
        "gatehouse_request_duration_seconds",
        "Admin API request duration in seconds"
    );
}
