// src/registry/descriptor.rs
//! Agent descriptor data model
//!
//! A descriptor is immutable once registered except for the lifecycle
//! fields (`status`, `last_seen`). The deployment kind is a closed tagged
//! variant: the execution router dispatches on the tag, there is no open
//! dynamic dispatch over agent kinds.

use crate::runtime::resource_limiter::ResourceLimits;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an agent is reached for task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Deployment {
    /// A worker process is spawned per task and torn down after
    Dynamic(WorkerConfig),

    /// The agent is reachable at a stable, pre-running endpoint
    Persistent {
        base_url: String,
        #[serde(default)]
        routes: Vec<RouteSpec>,
    },
}

impl Deployment {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Deployment::Dynamic(_))
    }
}

/// Startup parameters for an ephemeral worker process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Agent archetype the worker binary should assume
    pub archetype: WorkerArchetype,

    /// Model reference, e.g. "openai/gpt-4"
    pub model_id: String,

    /// Tool names handed to the worker
    #[serde(default)]
    pub tools: Vec<String>,

    /// Optional system prompt
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Resource limits applied to the worker process
    #[serde(default)]
    pub limits: ResourceLimits,
}

/// Supported worker archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerArchetype {
    Code,
    Llm,
    Tool,
    Generic,
}

impl WorkerArchetype {
    /// Archetype name passed to the worker binary
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerArchetype::Code => "code",
            WorkerArchetype::Llm => "llm",
            WorkerArchetype::Tool => "tool",
            WorkerArchetype::Generic => "generic",
        }
    }
}

/// A named sub-route exposed by a persistent agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    pub path: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub description: String,
}

fn default_method() -> String {
    "POST".to_string()
}

/// Agent lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Active,
    Inactive,
}

/// A registered agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Opaque agent id
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub deployment: Deployment,

    #[serde(default = "default_state")]
    pub status: AgentState,

    #[serde(default = "Utc::now")]
    pub last_seen: DateTime<Utc>,
}

fn default_state() -> AgentState {
    AgentState::Active
}
