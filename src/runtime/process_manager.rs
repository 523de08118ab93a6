// src/runtime/process_manager.rs
//! Worker process lifecycle: spawn, invoke, terminate
//!
//! One ephemeral worker process is spawned per dynamically-executed task,
//! bound to a leased port, spoken to over HTTP, and torn down afterwards.
//! `terminate` escalates from SIGTERM to SIGKILL after a grace period and
//! never propagates failure: a process that refuses to die must not leak a
//! task or a port, so cleanup continues regardless and the failure is only
//! logged.

use crate::registry::descriptor::WorkerConfig;
use crate::utils::errors::{EngineError, Result};
use crate::utils::http::JsonClient;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Ownership token for one spawned worker process
pub struct WorkerHandle {
    /// Process id, if a real process backs this handle
    pub pid: Option<u32>,

    /// Port the worker is bound to
    pub port: u16,

    /// Base URL of the worker's request/response endpoint
    pub url: String,

    /// The child process; absent for test doubles
    pub child: Option<Child>,

    /// When the worker was spawned
    pub spawned_at: Instant,
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("pid", &self.pid)
            .field("port", &self.port)
            .finish()
    }
}

/// Lifecycle operations over ephemeral workers.
///
/// The execution router drives this trait; the process-backed implementation
/// is below, tests substitute scripted doubles.
#[async_trait]
pub trait WorkerLifecycle: Send + Sync {
    /// Spawn a worker for `agent_id` bound to `port`. The worker must be
    /// accepting connections when this returns.
    async fn spawn(&self, agent_id: &str, config: &WorkerConfig, port: u16)
        -> Result<WorkerHandle>;

    /// Transmit a task payload and wait for the worker's response. The
    /// caller owns the deadline; this blocks the calling execution only.
    async fn send(&self, handle: &WorkerHandle, payload: &Value) -> Result<Value>;

    /// Tear the worker down. Must be called on every path that created a
    /// handle and never fails from the caller's perspective.
    async fn terminate(&self, handle: WorkerHandle);
}

/// Configuration for the process-backed lifecycle manager
#[derive(Debug, Clone)]
pub struct ProcessManagerConfig {
    /// Worker executable name, resolved through PATH
    pub worker_command: String,

    /// How long a worker may take to start accepting connections
    pub spawn_timeout: Duration,

    /// Grace period between SIGTERM and SIGKILL
    pub shutdown_grace: Duration,
}

impl Default for ProcessManagerConfig {
    fn default() -> Self {
        Self {
            worker_command: "agenthub-worker".to_string(),
            spawn_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Process-backed worker lifecycle manager
pub struct ProcessLifecycleManager {
    config: ProcessManagerConfig,
    client: JsonClient,
}

impl ProcessLifecycleManager {
    pub fn new(config: ProcessManagerConfig) -> Self {
        Self {
            config,
            client: JsonClient::new(),
        }
    }

    /// Resolve the worker executable in PATH
    fn find_executable(&self) -> Result<PathBuf> {
        which::which(&self.config.worker_command).map_err(|e| {
            EngineError::SpawnFailed(format!(
                "executable '{}' not found in PATH: {e}",
                self.config.worker_command
            ))
        })
    }

    /// Wait until the worker accepts TCP connections on its port, or fail
    /// if it exits early or misses the spawn deadline.
    async fn await_ready(&self, child: &mut Child, port: u16) -> Result<()> {
        let deadline = Instant::now() + self.config.spawn_timeout;
        let addr = format!("127.0.0.1:{port}");

        loop {
            if let Some(status) = child.try_wait()? {
                return Err(EngineError::SpawnFailed(format!(
                    "worker exited during startup with {status}"
                )));
            }

            if TcpStream::connect(&addr).await.is_ok() {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(EngineError::SpawnFailed(format!(
                    "worker did not accept connections on port {port} within {:?}",
                    self.config.spawn_timeout
                )));
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[async_trait]
impl WorkerLifecycle for ProcessLifecycleManager {
    async fn spawn(
        &self,
        agent_id: &str,
        config: &WorkerConfig,
        port: u16,
    ) -> Result<WorkerHandle> {
        let executable = self.find_executable()?;

        debug!(agent_id, port, ?executable, "spawning worker");

        let mut command = Command::new(executable);
        command
            .arg("--port")
            .arg(port.to_string())
            .arg("--archetype")
            .arg(config.archetype.as_str())
            .arg("--model")
            .arg(&config.model_id)
            .env("AGENTHUB_AGENT_ID", agent_id)
            .env("AGENTHUB_TOOLS", config.tools.join(","))
            .env(
                "AGENTHUB_RESOURCE_LIMITS",
                serde_json::to_string(&config.limits)
                    .map_err(|e| EngineError::SpawnFailed(format!("limits encode error: {e}")))?,
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(prompt) = &config.system_prompt {
            command.env("AGENTHUB_SYSTEM_PROMPT", prompt);
        }

        let mut child = command
            .spawn()
            .map_err(|e| EngineError::SpawnFailed(format!("failed to spawn worker: {e}")))?;

        let spawned_at = Instant::now();

        if let Err(e) = self.await_ready(&mut child, port).await {
            // Startup failed; reap before surfacing the error
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(e);
        }

        let pid = child.id();
        info!(agent_id, port, pid, "worker ready");

        Ok(WorkerHandle {
            pid,
            port,
            url: format!("http://127.0.0.1:{port}"),
            child: Some(child),
            spawned_at,
        })
    }

    async fn send(&self, handle: &WorkerHandle, payload: &Value) -> Result<Value> {
        self.client
            .post_json(&format!("{}/run", handle.url), payload)
            .await
    }

    async fn terminate(&self, mut handle: WorkerHandle) {
        let Some(mut child) = handle.child.take() else {
            return;
        };

        let Some(pid) = child.id() else {
            // Already reaped
            let _ = child.wait().await;
            return;
        };

        debug!(pid, port = handle.port, "terminating worker");

        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let raw_pid = Pid::from_raw(pid as i32);

        if let Err(e) = kill(raw_pid, Signal::SIGTERM) {
            warn!(pid, "failed to send SIGTERM: {e}");
        }

        match tokio::time::timeout(self.config.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(pid, %status, "worker exited");
                return;
            }
            Ok(Err(e)) => {
                warn!(pid, "error waiting for worker: {e}");
                return;
            }
            Err(_) => {
                warn!(pid, "worker ignored SIGTERM, escalating to SIGKILL");
            }
        }

        if let Err(e) = kill(raw_pid, Signal::SIGKILL) {
            warn!(pid, "failed to send SIGKILL: {e}");
        }

        match child.wait().await {
            Ok(status) => debug!(pid, %status, "worker killed"),
            Err(e) => warn!(pid, "failed to reap worker: {e}"),
        }
    }
}
