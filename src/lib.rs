// src/lib.rs
//! AgentHub Execution Engine Library
//!
//! The dynamic task execution core of an agent marketplace: accepts task
//! submissions against registered agents, decides between proxying to a
//! persistent endpoint and spawning an ephemeral worker on a leased port,
//! enforces bounded execution windows, and reports asynchronous completion
//! through a pollable task store.
//!
//! # Architecture
//!
//! - **registry**: agent descriptors and the registry collaborator interface
//! - **runtime**: port allocator and worker process lifecycle
//! - **executor**: task store, execution router, scheduler, analytics
//! - **observability**: tracing and metrics initialization
//! - **utils**: errors, configuration, shared HTTP client

// Public module exports
pub mod executor;
pub mod observability;
pub mod registry;
pub mod runtime;
pub mod utils;

// Re-export commonly used types
pub use executor::{
    AnalyticsAggregator, AnalyticsSummary, ExecutionRouter, Scheduler, SchedulerConfig,
    TaskRecord, TaskStatus, TaskStore,
};
pub use registry::{AgentDescriptor, AgentRegistry, Deployment, InMemoryRegistry};
pub use runtime::{PortAllocator, ProcessLifecycleManager, ProcessManagerConfig, WorkerLifecycle};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
