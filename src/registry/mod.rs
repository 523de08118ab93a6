// src/registry/mod.rs
//! Agent registry collaborator interface
//!
//! The engine consumes the registry through one narrow lookup; everything
//! else (registration APIs, persistence) lives outside the core. The
//! in-memory implementation backs tests and single-process deployments.

pub mod descriptor;
pub mod in_memory;

use async_trait::async_trait;

pub use descriptor::{
    AgentDescriptor, AgentState, Deployment, RouteSpec, WorkerArchetype, WorkerConfig,
};
pub use in_memory::InMemoryRegistry;

/// Lookup interface the execution engine consumes
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Fetch the descriptor for an agent id, if registered
    async fn get(&self, agent_id: &str) -> Option<AgentDescriptor>;
}
