// src/executor/mod.rs
//! Task execution: store, router, scheduler, analytics
//!
//! Control flow: a submission creates a `queued` record in the task store
//! and enters a bounded dispatch lane; the execution router then owns that
//! task until it is terminal, leasing a port and spawning a worker for
//! dynamic agents or proxying to the stored endpoint for persistent ones.
//! Callers poll `Scheduler::status`; the analytics aggregator folds the
//! terminal records into per-agent summaries.

pub mod analytics;
pub mod router;
pub mod scheduler;
pub mod task_store;

pub use analytics::{AnalyticsAggregator, AnalyticsSummary};
pub use router::ExecutionRouter;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use task_store::{TaskError, TaskErrorKind, TaskOutcome, TaskRecord, TaskStatus, TaskStore};
