// src/executor/router.rs
//! Execution router: drives one task from `queued` to a terminal state
//!
//! Dispatches on the agent's deployment tag: persistent agents get an HTTP
//! proxy call, dynamic agents get a leased port plus a freshly spawned
//! worker. In the dynamic path the worker is terminated and the port
//! released on every exit path, in that order, before the task record goes
//! terminal. No retries happen here; retry policy belongs to the caller.

use crate::executor::task_store::{TaskError, TaskErrorKind, TaskOutcome, TaskRecord, TaskStore};
use crate::registry::descriptor::{Deployment, WorkerConfig};
use crate::registry::AgentRegistry;
use crate::runtime::port_allocator::PortAllocator;
use crate::runtime::process_manager::WorkerLifecycle;
use crate::utils::http::JsonClient;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Routes task requests to persistent endpoints or ephemeral workers
pub struct ExecutionRouter {
    store: Arc<TaskStore>,
    registry: Arc<dyn AgentRegistry>,
    ports: PortAllocator,
    lifecycle: Arc<dyn WorkerLifecycle>,
    client: JsonClient,
}

impl ExecutionRouter {
    pub fn new(
        store: Arc<TaskStore>,
        registry: Arc<dyn AgentRegistry>,
        ports: PortAllocator,
        lifecycle: Arc<dyn WorkerLifecycle>,
    ) -> Self {
        Self {
            store,
            registry,
            ports,
            lifecycle,
            client: JsonClient::new(),
        }
    }

    /// Execute one task to completion. Invoked exactly once per task id;
    /// this invocation owns every write to the record until it is terminal.
    pub async fn execute(&self, task_id: &str) {
        if let Err(e) = self.store.mark_running(task_id) {
            error!(task_id, "cannot start task: {e}");
            return;
        }

        let record = match self.store.get(task_id) {
            Ok(record) => record,
            Err(e) => {
                error!(task_id, "task vanished after mark_running: {e}");
                return;
            }
        };

        let timeout = Duration::from_millis(record.timeout_ms);

        let outcome = match self.registry.get(&record.agent_id).await {
            None => {
                debug!(task_id, agent_id = %record.agent_id, "agent not registered");
                TaskOutcome::Failed(TaskError::new(
                    TaskErrorKind::UnknownAgent,
                    format!("unknown agent: {}", record.agent_id),
                ))
            }
            Some(descriptor) => match &descriptor.deployment {
                Deployment::Persistent { base_url, .. } => {
                    self.execute_persistent(base_url, &record, timeout).await
                }
                Deployment::Dynamic(config) => {
                    self.execute_dynamic(&record, config, timeout).await
                }
            },
        };

        let status = outcome.status();
        if let Err(e) = self.store.finish(task_id, outcome) {
            error!(task_id, "failed to finalize task: {e}");
            return;
        }

        counter!("engine_tasks_total", "status" => status.as_str()).increment(1);
        if let Ok(record) = self.store.get(task_id) {
            if let Some(duration) = record.duration_ms {
                histogram!("engine_task_duration_ms").record(duration as f64);
            }
        }

        info!(task_id, status = status.as_str(), "task finished");
    }

    /// Proxy the payload to a persistent agent's endpoint.
    ///
    /// The task timeout is raced against the proxy call so a stalled
    /// upstream can never leave the record in `running` forever.
    async fn execute_persistent(
        &self,
        base_url: &str,
        record: &TaskRecord,
        timeout: Duration,
    ) -> TaskOutcome {
        let url = format!("{}{}", base_url.trim_end_matches('/'), record.endpoint);
        debug!(task_id = %record.id, %url, "proxying to persistent agent");

        match tokio::time::timeout(timeout, self.client.post_json(&url, &record.payload)).await {
            Ok(Ok(result)) => TaskOutcome::Completed(result),
            Ok(Err(e)) => TaskOutcome::Failed(TaskError::from_engine_error(&e)),
            Err(_) => TaskOutcome::TimedOut,
        }
    }

    /// Spawn a worker on a leased port, send the payload, race the deadline,
    /// then unconditionally terminate the worker and release the port.
    async fn execute_dynamic(
        &self,
        record: &TaskRecord,
        config: &WorkerConfig,
        timeout: Duration,
    ) -> TaskOutcome {
        let lease = match self.ports.acquire() {
            Ok(lease) => lease,
            Err(e) => return TaskOutcome::Failed(TaskError::from_engine_error(&e)),
        };

        let handle = match self
            .lifecycle
            .spawn(&record.agent_id, config, lease.port())
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                // No worker to terminate; dropping the lease frees the port
                warn!(task_id = %record.id, "worker spawn failed: {e}");
                return TaskOutcome::Failed(TaskError::from_engine_error(&e));
            }
        };

        let outcome = match tokio::time::timeout(
            timeout,
            self.lifecycle.send(&handle, &record.payload),
        )
        .await
        {
            Ok(Ok(result)) => TaskOutcome::Completed(result),
            Ok(Err(e)) => TaskOutcome::Failed(TaskError::from_engine_error(&e)),
            Err(_) => {
                debug!(task_id = %record.id, "worker deadline elapsed");
                TaskOutcome::TimedOut
            }
        };

        // Cleanup is unconditional and ordered: terminate the worker, then
        // drop the lease to return the port
        self.lifecycle.terminate(handle).await;
        drop(lease);

        outcome
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted worker lifecycle for exercising the router without
    //! spawning real processes

    use super::*;
    use crate::runtime::process_manager::WorkerHandle;
    use crate::utils::errors::{EngineError, Result};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// What the scripted worker does when sent a payload
    #[derive(Clone)]
    pub enum WorkerScript {
        /// Respond with this value after the given delay
        Respond(Value, Duration),
        /// Never respond (forces the deadline)
        Hang,
        /// Report an application-level failure
        RemoteFailure(String),
        /// Fail at spawn time
        FailSpawn(String),
    }

    #[derive(Default)]
    pub struct LifecycleLog {
        pub spawned: AtomicUsize,
        pub terminated: AtomicUsize,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    pub struct ScriptedLifecycle {
        pub script: WorkerScript,
        pub log: Arc<LifecycleLog>,
    }

    impl ScriptedLifecycle {
        pub fn new(script: WorkerScript) -> Self {
            Self {
                script,
                log: Arc::new(LifecycleLog::default()),
            }
        }
    }

    #[async_trait]
    impl WorkerLifecycle for ScriptedLifecycle {
        async fn spawn(
            &self,
            _agent_id: &str,
            _config: &WorkerConfig,
            port: u16,
        ) -> Result<WorkerHandle> {
            if let WorkerScript::FailSpawn(detail) = &self.script {
                return Err(EngineError::SpawnFailed(detail.clone()));
            }

            self.log.spawned.fetch_add(1, Ordering::SeqCst);
            let now = self.log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.log.max_in_flight.fetch_max(now, Ordering::SeqCst);

            Ok(WorkerHandle {
                pid: None,
                port,
                url: format!("http://127.0.0.1:{port}"),
                child: None,
                spawned_at: Instant::now(),
            })
        }

        async fn send(&self, _handle: &WorkerHandle, _payload: &Value) -> Result<Value> {
            match &self.script {
                WorkerScript::Respond(value, delay) => {
                    tokio::time::sleep(*delay).await;
                    Ok(value.clone())
                }
                WorkerScript::Hang => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
                WorkerScript::RemoteFailure(detail) => Err(EngineError::Remote(detail.clone())),
                WorkerScript::FailSpawn(_) => unreachable!("spawn never succeeds"),
            }
        }

        async fn terminate(&self, _handle: WorkerHandle) {
            self.log.terminated.fetch_add(1, Ordering::SeqCst);
            self.log.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
