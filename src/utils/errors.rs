// src/utils/errors.rs
//! Error types for the execution engine
//!
//! The taxonomy mirrors the task lifecycle: submission-time backpressure
//! (`QueueFull`), execution-time failures (`UnknownAgent`, `ResourceExhausted`,
//! `SpawnFailed`, `Comm`, `Remote`), and lookup failures (`TaskNotFound`).
//! Deadline expiry is not an error here: the router records it directly as
//! the `timed_out` task status. None of these are retried inside the
//! engine; retry policy belongs to the caller.

use thiserror::Error;

/// Result type used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by the execution engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The task references an agent id the registry does not know
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// No free port in the allocator pool
    #[error("no free port in pool")]
    ResourceExhausted,

    /// The submission queue is at capacity
    #[error("submission queue full")]
    QueueFull,

    /// The worker process could not be started
    #[error("worker spawn failed: {0}")]
    SpawnFailed(String),

    /// The channel to a worker or upstream agent broke mid-execution
    #[error("communication error: {0}")]
    Comm(String),

    /// The worker or upstream agent ran but reported an application failure
    #[error("remote error: {0}")]
    Remote(String),

    /// No task record exists for the given id
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// An illegal task state transition was attempted
    #[error("invalid task transition: {task_id} is already {status}")]
    InvalidTransition { task_id: String, status: String },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
