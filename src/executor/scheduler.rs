// src/executor/scheduler.rs
//! Task submission and dispatch
//!
//! `submit` creates a `queued` record and returns immediately; callers poll
//! `status`. Tasks drain through two bounded lanes: dynamic-agent tasks are
//! capped by a semaphore equal to the port pool size (the mechanism that
//! prevents unbounded process spawning), persistent-agent tasks by a
//! separate, larger ceiling. Excess submissions wait in the lane's queue;
//! only a full queue fails fast, with `QueueFull`.
//!
//! Lane choice peeks the registry without surfacing errors: tasks for
//! unregistered agents ride the persistent lane (they consume no port) and
//! fail inside the router with `UnknownAgent` at execution time.

use crate::executor::router::ExecutionRouter;
use crate::executor::task_store::{TaskRecord, TaskStore};
use crate::registry::AgentRegistry;
use crate::utils::errors::{EngineError, Result};
use metrics::counter;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Bounded depth of each lane's submission queue
    pub queue_depth: usize,

    /// Concurrency ceiling for dynamic-agent tasks; must equal the port
    /// pool size so the allocator's fail-fast path is never the first line
    /// of backpressure
    pub dynamic_concurrency: usize,

    /// Concurrency ceiling for persistent-agent tasks
    pub persistent_concurrency: usize,

    /// Timeout applied when a submission does not declare one
    pub default_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_depth: 256,
            dynamic_concurrency: 1000,
            persistent_concurrency: 64,
            default_timeout_ms: 30_000,
        }
    }
}

/// Accepts task submissions and dispatches them to the execution router
pub struct Scheduler {
    store: Arc<TaskStore>,
    registry: Arc<dyn AgentRegistry>,
    config: SchedulerConfig,
    dynamic_tx: mpsc::Sender<String>,
    persistent_tx: mpsc::Sender<String>,
}

impl Scheduler {
    /// Build the scheduler and start its two dispatch lanes
    pub fn new(
        store: Arc<TaskStore>,
        registry: Arc<dyn AgentRegistry>,
        router: Arc<ExecutionRouter>,
        config: SchedulerConfig,
    ) -> Self {
        let (dynamic_tx, dynamic_rx) = mpsc::channel(config.queue_depth);
        let (persistent_tx, persistent_rx) = mpsc::channel(config.queue_depth);

        tokio::spawn(dispatch_lane(
            "dynamic",
            dynamic_rx,
            Arc::new(Semaphore::new(config.dynamic_concurrency)),
            Arc::clone(&router),
        ));
        tokio::spawn(dispatch_lane(
            "persistent",
            persistent_rx,
            Arc::new(Semaphore::new(config.persistent_concurrency)),
            router,
        ));

        info!(
            queue_depth = config.queue_depth,
            dynamic_concurrency = config.dynamic_concurrency,
            persistent_concurrency = config.persistent_concurrency,
            "scheduler started"
        );

        Self {
            store,
            registry,
            config,
            dynamic_tx,
            persistent_tx,
        }
    }

    /// Submit a task. Returns the task id immediately; execution is
    /// asynchronous and observed through `status`. Unknown agents are
    /// accepted here and fail at execution time.
    pub async fn submit(
        &self,
        agent_id: &str,
        endpoint: &str,
        payload: Value,
        timeout_ms: Option<u64>,
    ) -> Result<String> {
        let timeout_ms = timeout_ms.unwrap_or(self.config.default_timeout_ms);
        let record = TaskRecord::new(agent_id, endpoint, payload, timeout_ms);
        let task_id = self.store.insert(record);

        let is_dynamic = self
            .registry
            .get(agent_id)
            .await
            .map(|descriptor| descriptor.deployment.is_dynamic())
            .unwrap_or(false);

        let lane = if is_dynamic {
            &self.dynamic_tx
        } else {
            &self.persistent_tx
        };

        if let Err(e) = lane.try_send(task_id.clone()) {
            // Roll the record back so a rejected submission leaves no trace
            self.store.remove(&task_id);
            return match e {
                mpsc::error::TrySendError::Full(_) => Err(EngineError::QueueFull),
                mpsc::error::TrySendError::Closed(_) => {
                    Err(EngineError::Comm("dispatch lane closed".to_string()))
                }
            };
        }

        counter!("engine_tasks_submitted_total").increment(1);
        debug!(task_id, agent_id, is_dynamic, "task queued");
        Ok(task_id)
    }

    /// Fetch the current record for a task
    pub fn status(&self, task_id: &str) -> Result<TaskRecord> {
        self.store.get(task_id)
    }
}

/// Drain one lane: pull a task id, wait for a concurrency permit, then run
/// the execution on its own tokio task so the lane keeps draining.
async fn dispatch_lane(
    lane: &'static str,
    mut rx: mpsc::Receiver<String>,
    permits: Arc<Semaphore>,
    router: Arc<ExecutionRouter>,
) {
    while let Some(task_id) = rx.recv().await {
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            // Semaphore closed means shutdown
            Err(_) => break,
        };

        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router.execute(&task_id).await;
            drop(permit);
        });
    }

    debug!(lane, "dispatch lane drained");
}
