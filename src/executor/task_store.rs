// src/executor/task_store.rs
//! Task records and their state machine
//!
//! Records are keyed by task id in a concurrent map; at most one execution
//! router invocation owns a given id between `queued` and a terminal state,
//! so writers never collide on the same key. Terminal records are retained
//! for client polling and the analytics aggregator.
//!
//! State machine: `queued -> running -> {completed | failed | timed_out}`.
//! Terminal states are never overwritten.

use crate::utils::errors::{EngineError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use ulid::Ulid;

/// Task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::TimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::TimedOut => "timed_out",
        }
    }
}

/// Error classification stored on a failed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    UnknownAgent,
    ResourceExhausted,
    SpawnError,
    CommError,
    RemoteError,
}

/// Error detail stored on a failed task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub detail: String,
}

impl TaskError {
    pub fn new(kind: TaskErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Classify an engine error for storage on the task record.
    ///
    /// Deadline expiry never reaches this function: a timed-out task
    /// carries no error content, only the `timed_out` status.
    pub fn from_engine_error(error: &EngineError) -> Self {
        match error {
            EngineError::UnknownAgent(id) => {
                Self::new(TaskErrorKind::UnknownAgent, format!("unknown agent: {id}"))
            }
            EngineError::ResourceExhausted => Self::new(
                TaskErrorKind::ResourceExhausted,
                "no free port in pool".to_string(),
            ),
            EngineError::SpawnFailed(detail) => {
                Self::new(TaskErrorKind::SpawnError, detail.clone())
            }
            EngineError::Comm(detail) => Self::new(TaskErrorKind::CommError, detail.clone()),
            EngineError::Remote(detail) => Self::new(TaskErrorKind::RemoteError, detail.clone()),
            other => Self::new(TaskErrorKind::CommError, other.to_string()),
        }
    }
}

/// The unit of trackable, asynchronously-pollable work state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub agent_id: String,

    /// Requested sub-route; meaningful only for persistent agents
    pub endpoint: String,

    pub payload: Value,
    pub timeout_ms: u64,

    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<TaskError>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl TaskRecord {
    pub fn new(agent_id: &str, endpoint: &str, payload: Value, timeout_ms: u64) -> Self {
        Self {
            id: Ulid::new().to_string(),
            agent_id: agent_id.to_string(),
            endpoint: endpoint.to_string(),
            payload,
            timeout_ms,
            status: TaskStatus::Queued,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
        }
    }
}

/// Terminal outcome applied to a running task
#[derive(Debug)]
pub enum TaskOutcome {
    Completed(Value),
    Failed(TaskError),
    TimedOut,
}

impl TaskOutcome {
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskOutcome::Completed(_) => TaskStatus::Completed,
            TaskOutcome::Failed(_) => TaskStatus::Failed,
            TaskOutcome::TimedOut => TaskStatus::TimedOut,
        }
    }
}

/// Concurrent store of task records
#[derive(Default)]
pub struct TaskStore {
    records: DashMap<String, TaskRecord>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly-created record, returning its id
    pub fn insert(&self, record: TaskRecord) -> String {
        let id = record.id.clone();
        self.records.insert(id.clone(), record);
        id
    }

    /// Fetch a record by id
    pub fn get(&self, task_id: &str) -> Result<TaskRecord> {
        self.records
            .get(task_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))
    }

    /// Remove a record; used to roll back a submission the queue rejected
    pub fn remove(&self, task_id: &str) {
        self.records.remove(task_id);
    }

    /// Transition `queued -> running`, stamping `started_at`
    pub fn mark_running(&self, task_id: &str) -> Result<()> {
        let mut entry = self
            .records
            .get_mut(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;

        if entry.status != TaskStatus::Queued {
            return Err(EngineError::InvalidTransition {
                task_id: task_id.to_string(),
                status: entry.status.as_str().to_string(),
            });
        }

        entry.status = TaskStatus::Running;
        entry.started_at = Some(Utc::now());
        Ok(())
    }

    /// Apply a terminal outcome, stamping `finished_at` and the duration.
    /// Refuses to overwrite a record that is already terminal.
    pub fn finish(&self, task_id: &str, outcome: TaskOutcome) -> Result<()> {
        let mut entry = self
            .records
            .get_mut(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;

        if entry.status.is_terminal() {
            warn!(task_id, status = entry.status.as_str(), "refusing to overwrite terminal task");
            return Err(EngineError::InvalidTransition {
                task_id: task_id.to_string(),
                status: entry.status.as_str().to_string(),
            });
        }

        let finished = Utc::now();
        entry.status = outcome.status();
        entry.finished_at = Some(finished);
        entry.duration_ms = entry
            .started_at
            .map(|started| (finished - started).num_milliseconds().max(0) as u64);

        match outcome {
            TaskOutcome::Completed(result) => entry.result = Some(result),
            TaskOutcome::Failed(error) => entry.error = Some(error),
            TaskOutcome::TimedOut => {}
        }

        Ok(())
    }

    /// All records for one agent, newest first
    pub fn list_by_agent(&self, agent_id: &str) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self
            .records
            .iter()
            .filter(|e| e.value().agent_id == agent_id)
            .map(|e| e.value().clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// All records in a given status
    pub fn list_by_status(&self, status: TaskStatus) -> Vec<TaskRecord> {
        self.records
            .iter()
            .filter(|e| e.value().status == status)
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
