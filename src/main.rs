// src/main.rs
//! AgentHub Execution Engine
//!
//! Daemon entrypoint: initializes observability, loads configuration,
//! optionally registers agents from a YAML manifest, and runs the
//! scheduler until shutdown. The outer API surface (REST routes, auth,
//! billing) lives in a separate service that embeds or fronts this engine.

use agenthub_engine::executor::{ExecutionRouter, Scheduler, SchedulerConfig, TaskStore};
use agenthub_engine::observability::{init_metrics, init_tracing};
use agenthub_engine::registry::{AgentDescriptor, AgentRegistry, InMemoryRegistry};
use agenthub_engine::runtime::{PortAllocator, ProcessLifecycleManager, ProcessManagerConfig};
use agenthub_engine::utils::config::EngineConfig;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    info!("Starting AgentHub execution engine v{}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load()?;
    info!("Configuration loaded: {:?}", config);

    init_metrics(&config.observability.metrics_addr)?;

    let ports = PortAllocator::new(
        config.runtime.port_range_start,
        config.runtime.port_range_end,
    );
    info!("Port pool initialized with {} ports", ports.capacity());

    let store = Arc::new(TaskStore::new());
    let registry = Arc::new(InMemoryRegistry::new());

    if let Some(manifest) = &config.agents_manifest {
        let agents = load_manifest(manifest)?;
        info!("Registering {} agents from {manifest}", agents.len());
        for descriptor in agents {
            registry.register(descriptor);
        }
    }

    let lifecycle = Arc::new(ProcessLifecycleManager::new(ProcessManagerConfig {
        worker_command: config.runtime.worker_command.clone(),
        spawn_timeout: Duration::from_secs(config.runtime.spawn_timeout_secs),
        shutdown_grace: Duration::from_secs(config.runtime.shutdown_grace_secs),
    }));

    let router = Arc::new(ExecutionRouter::new(
        Arc::clone(&store),
        Arc::clone(&registry) as Arc<dyn AgentRegistry>,
        ports.clone(),
        lifecycle,
    ));

    let _scheduler = Scheduler::new(
        Arc::clone(&store),
        Arc::clone(&registry) as Arc<dyn AgentRegistry>,
        router,
        SchedulerConfig {
            queue_depth: config.scheduler.queue_depth,
            dynamic_concurrency: ports.capacity(),
            persistent_concurrency: config.scheduler.persistent_concurrency,
            default_timeout_ms: config.scheduler.default_timeout_ms,
        },
    );

    info!("Engine ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C signal handler")?;
    info!("Received shutdown signal, stopping engine");

    Ok(())
}

fn load_manifest(path: &str) -> Result<Vec<AgentDescriptor>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read agent manifest {path}"))?;
    let agents: Vec<AgentDescriptor> =
        serde_yaml::from_str(&raw).with_context(|| format!("invalid agent manifest {path}"))?;
    Ok(agents)
}
