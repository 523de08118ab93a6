// src/observability/mod.rs
//! Tracing and metrics initialization
//!
//! `init_tracing` installs a `tracing` subscriber honoring `RUST_LOG`;
//! `init_metrics` installs the Prometheus exporter on the configured
//! listen address. Both are called once from `main` before any engine
//! component is constructed.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the tracing subscriber
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init tracing: {e}"))?;

    Ok(())
}

/// Initialize the Prometheus metrics exporter on the given listen address.
///
/// The address is explicit rather than the exporter's built-in default
/// (`0.0.0.0:9000`), which sits at the front of the worker port pool: a
/// worker leased port 9000 could never bind it, and its readiness probe
/// would connect to the exporter instead.
pub fn init_metrics(listen_addr: &str) -> Result<()> {
    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("invalid metrics listen address: {listen_addr}"))?;
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}
