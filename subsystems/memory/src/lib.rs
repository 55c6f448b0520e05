//! # Bootmem Pool
//!
//! Boot-time physical memory tracker. Before any general purpose allocator
//! exists, the kernel needs to know which physical ranges are RAM, which are
//! reserved or device memory, and which it has already handed out. The pool
//! answers those questions and hands out aligned chunks of free RAM.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            BOOTMEM POOL                               │
//! │                                                                       │
//! │  ┌─────────────┐   init    ┌────────────────────────────────────┐    │
//! │  │ bootloader  │──────────▶│ Pool                               │    │
//! │  │ memory map  │           │  sorted, coalesced MemoryRange list │    │
//! │  └─────────────┘           │  allocate / free / update           │    │
//! │                            └──────────────┬─────────────────────┘    │
//! │                                           │ nodes stored in           │
//! │                                           ▼                           │
//! │                            ┌────────────────────────────────────┐    │
//! │                            │ PoolBookkeeping slabs (self-hosted) │    │
//! │                            └────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pool needs no heap. Its nodes live in `PoolBookkeeping` ranges taken
//! from the very RAM it tracks, reached through a [`PhysicalMemory`]
//! implementation such as [`DirectMap`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bootmem_pool::{DirectMap, Pool};
//! use bootmem_ranges::{MemoryKind, MemoryRange};
//!
//! let mut pool = Pool::with_defaults(DirectMap::identity());
//! pool.init(&mut [&mut boot_map[..]])?;
//!
//! let tables = pool.allocate(MemoryKind::PAGE_TABLES, 0x4000, 0x1000, 0x1_0000_0000)?;
//! pool.log_ranges();
//! ```

#![cfg_attr(not(test), no_std)]

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Pool configuration
pub mod config;

/// Diagnostics and statistics
pub mod diag;

/// Error handling
pub mod error;

/// Physical memory access
pub mod memory;

/// Node storage
mod node;

/// The pool
pub mod pool;

#[cfg(test)]
mod testing;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use bootmem_ranges::{ExtendedKind, MemoryKind, MemoryRange};

pub use crate::config::{PoolConfig, BOOKKEEPING_CHUNK_SIZE, NULL_POINTER_REGION_END};
pub use crate::diag::{HumanSize, PoolDump, PoolStats};
pub use crate::error::{ErrorClass, PoolError, PoolResult};
pub use crate::memory::{DirectMap, PhysicalMemory};
pub use crate::pool::{bookkeeping_size, node_capacity, NodeId, Pool};
