// src/runtime/mod.rs
//! Worker runtime: port leasing and process lifecycle
//!
//! - **Port Allocator**: fixed pool of reusable ports, one lease per
//!   in-flight dynamic execution
//! - **Process Lifecycle Manager**: spawn, invoke, and tear down one
//!   ephemeral worker per dynamically-executed task
//! - **Resource Limits**: per-worker caps carried in the agent descriptor
//!
//! The execution router drives both: acquire a port, spawn a worker bound
//! to it, send the task payload, then unconditionally terminate the worker
//! and release the port regardless of outcome.

pub mod port_allocator;
pub mod process_manager;
pub mod resource_limiter;

pub use port_allocator::{PortAllocator, PortLease};
pub use process_manager::{
    ProcessLifecycleManager, ProcessManagerConfig, WorkerHandle, WorkerLifecycle,
};
pub use resource_limiter::ResourceLimits;
