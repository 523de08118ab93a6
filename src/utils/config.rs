// src/utils/config.rs
//! Engine configuration
//!
//! Loaded from an optional `config/engine.{toml,yaml}` file with
//! `ENGINE_`-prefixed environment variable overrides, e.g.
//! `ENGINE_RUNTIME__PORT_RANGE_START=10000`.

use crate::utils::errors::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker runtime settings
    pub runtime: RuntimeSettings,

    /// Scheduler settings
    pub scheduler: SchedulerSettings,

    /// Metrics exporter settings
    pub observability: ObservabilitySettings,

    /// Optional YAML manifest of agent descriptors registered at boot
    pub agents_manifest: Option<String>,
}

/// Settings for the Prometheus exporter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Listen address for the metrics endpoint. Must not fall inside the
    /// worker port pool: workers probe their leased port for readiness,
    /// and an exporter squatting on a pool port answers that probe.
    pub metrics_addr: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            metrics_addr: "127.0.0.1:10900".to_string(),
        }
    }
}

/// Settings for the port pool and worker processes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// First port in the worker pool (inclusive)
    pub port_range_start: u16,

    /// Last port in the worker pool (inclusive)
    pub port_range_end: u16,

    /// Worker executable, resolved through PATH
    pub worker_command: String,

    /// How long a worker may take to accept connections after spawn
    pub spawn_timeout_secs: u64,

    /// Grace period between SIGTERM and SIGKILL on teardown
    pub shutdown_grace_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            port_range_start: 9000,
            port_range_end: 9999,
            worker_command: "agenthub-worker".to_string(),
            spawn_timeout_secs: 10,
            shutdown_grace_secs: 5,
        }
    }
}

/// Settings for the submission queue and dispatch lanes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Bounded depth of the submission queue per lane
    pub queue_depth: usize,

    /// Concurrency ceiling for persistent-agent tasks. Dynamic tasks are
    /// capped by the port pool size instead.
    pub persistent_concurrency: usize,

    /// Timeout applied when a submission does not declare one
    pub default_timeout_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            queue_depth: 256,
            persistent_concurrency: 64,
            default_timeout_ms: 30_000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        Self::load_from("config/engine")
    }

    /// Load configuration from a specific file stem
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("ENGINE").separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run safely
    pub fn validate(&self) -> Result<()> {
        if self.runtime.port_range_start > self.runtime.port_range_end {
            return Err(config::ConfigError::Message(format!(
                "port_range_start {} exceeds port_range_end {}",
                self.runtime.port_range_start, self.runtime.port_range_end
            ))
            .into());
        }

        if let Some(port) = self.metrics_port() {
            if (self.runtime.port_range_start..=self.runtime.port_range_end).contains(&port) {
                return Err(config::ConfigError::Message(format!(
                    "metrics_addr port {port} falls inside the worker pool \
                     {}-{}; workers could never bind it",
                    self.runtime.port_range_start, self.runtime.port_range_end
                ))
                .into());
            }
        }

        Ok(())
    }

    fn metrics_port(&self) -> Option<u16> {
        self.observability
            .metrics_addr
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
    }

    /// Number of ports in the configured pool
    pub fn pool_size(&self) -> usize {
        (self.runtime.port_range_end - self.runtime.port_range_start) as usize + 1
    }
}
