// src/runtime/resource_limiter.rs
//! Resource limits for ephemeral worker processes
//!
//! Limits travel inside a dynamic agent's `WorkerConfig` and are handed to
//! the spawned worker through its environment. The worker binary is
//! responsible for honoring them; the engine only validates and transports
//! them.

use serde::{Deserialize, Serialize};

/// Resource limits for one worker process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU quota as percentage of one core (100 = a full core)
    pub cpu_quota: Option<u32>,

    /// Memory limit in megabytes
    pub memory_limit_mb: Option<u64>,

    /// Maximum model tokens per task, for LLM-backed archetypes
    pub max_tokens: Option<u32>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_quota: Some(100),
            memory_limit_mb: Some(512),
            max_tokens: Some(2048),
        }
    }
}

impl ResourceLimits {
    /// No restrictions
    pub fn unlimited() -> Self {
        Self {
            cpu_quota: None,
            memory_limit_mb: None,
            max_tokens: None,
        }
    }

    /// Tight limits for untrusted marketplace agents
    pub fn strict() -> Self {
        Self {
            cpu_quota: Some(25),
            memory_limit_mb: Some(256),
            max_tokens: Some(1024),
        }
    }

    /// Check the limits are internally sane
    pub fn validate(&self) -> Result<(), String> {
        if let Some(quota) = self.cpu_quota {
            if quota == 0 {
                return Err("CPU quota cannot be 0".to_string());
            }
            if quota > 400 {
                return Err("CPU quota cannot exceed 400% (4 cores)".to_string());
            }
        }

        if let Some(memory) = self.memory_limit_mb {
            if memory < 64 {
                return Err("Memory limit cannot be less than 64MB".to_string());
            }
        }

        if let Some(tokens) = self.max_tokens {
            if tokens == 0 {
                return Err("Token limit cannot be 0".to_string());
            }
        }

        Ok(())
    }
}
