// src/runtime/port_allocator.rs
//! Fixed-pool port allocator for ephemeral workers
//!
//! Each in-flight dynamic execution holds exactly one port from a fixed
//! range (default 9000-9999). `acquire` is non-blocking and fails fast when
//! the pool is empty so the scheduler keeps backpressure visible instead of
//! stalling the queue. `release` is idempotent: releasing a port that is not
//! currently leased is a no-op, which makes the dual-path cleanup (normal
//! completion racing timeout cleanup) safe.
//!
//! Leases are not persisted; a process restart starts from a full pool.

use crate::utils::errors::{EngineError, Result};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

struct PoolState {
    free: VecDeque<u16>,
    leased: HashSet<u16>,
}

/// Thread-safe allocator over a fixed port range
#[derive(Clone)]
pub struct PortAllocator {
    inner: Arc<Mutex<PoolState>>,
    capacity: usize,
}

impl PortAllocator {
    /// Create an allocator over the inclusive range `start..=end`
    pub fn new(start: u16, end: u16) -> Self {
        assert!(start <= end, "port range start must not exceed end");

        let free: VecDeque<u16> = (start..=end).collect();
        let capacity = free.len();

        Self {
            inner: Arc::new(Mutex::new(PoolState {
                free,
                leased: HashSet::with_capacity(capacity),
            })),
            capacity,
        }
    }

    /// Lease a port. Fails fast with `ResourceExhausted` when none is free.
    pub fn acquire(&self) -> Result<PortLease> {
        let mut state = self.inner.lock();

        match state.free.pop_front() {
            Some(port) => {
                state.leased.insert(port);
                debug!(port, "leased port");
                Ok(PortLease {
                    port,
                    inner: Arc::clone(&self.inner),
                    released: false,
                })
            }
            None => {
                warn!("port pool exhausted");
                Err(EngineError::ResourceExhausted)
            }
        }
    }

    /// Return a port to the free set. No-op if the port is not leased.
    pub fn release(&self, port: u16) {
        release_port(&self.inner, port);
    }

    /// Number of ports currently free
    pub fn available(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// Total pool size
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn release_port(inner: &Mutex<PoolState>, port: u16) {
    let mut state = inner.lock();
    if state.leased.remove(&port) {
        state.free.push_back(port);
        debug!(port, "released port");
    } else {
        debug!(port, "ignored release of unleased port");
    }
}

/// RAII lease on one port; dropping it returns the port exactly once
pub struct PortLease {
    port: u16,
    inner: Arc<Mutex<PoolState>>,
    released: bool,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            release_port(&self.inner, self.port);
        }
    }
}

impl std::fmt::Debug for PortLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortLease").field("port", &self.port).finish()
    }
}
