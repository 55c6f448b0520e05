//! # Pool Configuration
//!
//! Tunables fixed at construction time. The defaults match a 4 KiB page
//! machine with the first 64 KiB kept unmapped to trap null dereferences.

use core::mem::size_of;

use crate::error::{PoolError, PoolResult};
use crate::node::Node;

/// Granularity of bookkeeping regions
pub const BOOKKEEPING_CHUNK_SIZE: u64 = 0x1000;

/// End of the low region withheld from free RAM
pub const NULL_POINTER_REGION_END: u64 = 0x10000;

/// Nodes a single chunk must hold for replenishment to make progress
pub const MIN_CHUNK_NODES: u64 = 4;

/// Pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Size and alignment of every bookkeeping region
    pub chunk_size: u64,
    /// Addresses below this never become allocatable
    pub null_region_end: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            chunk_size: BOOKKEEPING_CHUNK_SIZE,
            null_region_end: NULL_POINTER_REGION_END,
        }
    }
}

impl PoolConfig {
    /// Create a configuration
    pub const fn new(chunk_size: u64, null_region_end: u64) -> Self {
        Self {
            chunk_size,
            null_region_end,
        }
    }

    /// Set the bookkeeping chunk size
    pub const fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the end of the null pointer region
    pub const fn with_null_region_end(mut self, null_region_end: u64) -> Self {
        self.null_region_end = null_region_end;
        self
    }

    /// Nodes held by one chunk
    pub const fn nodes_per_chunk(&self) -> u64 {
        self.chunk_size / size_of::<Node>() as u64
    }

    /// Check the configuration
    pub fn validate(&self) -> PoolResult<()> {
        if !self.chunk_size.is_power_of_two() {
            return Err(PoolError::InvalidConfig("chunk size must be a power of two"));
        }
        if self.nodes_per_chunk() < MIN_CHUNK_NODES {
            return Err(PoolError::InvalidConfig("chunk size too small to hold bookkeeping nodes"));
        }
        if self.chunk_size > usize::MAX as u64 {
            return Err(PoolError::InvalidConfig("chunk size exceeds the address space"));
        }
        Ok(())
    }
}
