// src/registry/in_memory.rs
//! In-memory agent registry backed by a concurrent map

use crate::registry::descriptor::AgentDescriptor;
use crate::registry::AgentRegistry;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::info;

/// Concurrent in-memory registry of agent descriptors
#[derive(Default)]
pub struct InMemoryRegistry {
    agents: DashMap<String, AgentDescriptor>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an agent descriptor
    pub fn register(&self, descriptor: AgentDescriptor) {
        info!(agent_id = %descriptor.id, name = %descriptor.name, "registered agent");
        self.agents.insert(descriptor.id.clone(), descriptor);
    }

    /// Record a heartbeat for an agent. Returns false for unknown ids.
    pub fn touch_last_seen(&self, agent_id: &str) -> bool {
        match self.agents.get_mut(agent_id) {
            Some(mut descriptor) => {
                descriptor.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    /// All registered agent ids
    pub fn list_ids(&self) -> Vec<String> {
        self.agents.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[async_trait]
impl AgentRegistry for InMemoryRegistry {
    async fn get(&self, agent_id: &str) -> Option<AgentDescriptor> {
        self.agents.get(agent_id).map(|e| e.value().clone())
    }
}
