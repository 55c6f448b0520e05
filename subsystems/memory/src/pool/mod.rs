//! # Memory Pool
//!
//! Registry of every physical range the bootloader reported, kept as a
//! sorted, non-overlapping, maximally coalesced list.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              POOL                                    │
//! │                                                                      │
//! │  0        null_end                                                   │
//! │  ├─ NULL ─┼─ BOOKKEEPING ─┼──── FREE ────┼─ RESERVED ─┼─ KERNEL ─┼─  │
//! │           │   nodes live  │  allocate()  │            │  free()  │   │
//! │           │   in here     │  carves from │            │  returns │   │
//! │           │               │  here        │            │  here    │   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. `Pool::new` creates an empty, uninitialized pool.
//! 2. `init` normalizes the bootloader map into nodes stored in memory taken
//!    from that same map.
//! 3. `allocate`, `free` and `update_free_ram_subranges` relabel sub-ranges.
//!    Each of them first makes sure two spare nodes exist, growing the
//!    bookkeeping by one chunk of free RAM when needed.
//!
//! The pool is single threaded; wrap it in a lock to share it.

mod init;
mod ops;
mod structure;


pub use self::init::{bookkeeping_size, node_capacity};

use bootmem_ranges::MemoryRange;

use crate::config::PoolConfig;
use crate::memory::PhysicalMemory;
use crate::node::NodeArena;

/// Logical index of an active node
pub type NodeId = usize;

/// Boot-time physical memory pool
#[derive(Debug)]
pub struct Pool<M: PhysicalMemory> {
    memory: M,
    config: PoolConfig,
    nodes: NodeArena,
    initialized: bool,
}

impl<M: PhysicalMemory> Pool<M> {
    /// Create an uninitialized pool
    pub const fn new(memory: M, config: PoolConfig) -> Self {
        Self {
            memory,
            config,
            nodes: NodeArena::new(),
            initialized: false,
        }
    }

    /// Create an uninitialized pool with the default configuration
    pub fn with_defaults(memory: M) -> Self {
        Self::new(memory, PoolConfig::default())
    }

    /// Get configuration
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check whether `init` has succeeded
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Tracked ranges in address order
    pub fn ranges(&self) -> impl Iterator<Item = MemoryRange> + '_ {
        self.nodes.iter()
    }

    /// Number of tracked ranges
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True before `init`
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Unused node slots
    pub const fn spare_nodes(&self) -> usize {
        self.nodes.spare()
    }

    /// Bookkeeping slabs in use
    pub fn slab_count(&self) -> usize {
        self.nodes.slab_count()
    }

    /// The tracked range fully containing `[address, address + size)`
    pub fn find(&self, address: u64, size: u64) -> Option<MemoryRange> {
        self.get_containing_node(address, size)
            .map(|id| self.nodes.get(id))
    }

    fn assert_initialized(&self) {
        assert!(self.initialized, "Pool: used before init");
    }

    /// Drop every node and return to the pre-init state
    fn reset(&mut self) {
        self.nodes = NodeArena::new();
        self.initialized = false;
    }
}
