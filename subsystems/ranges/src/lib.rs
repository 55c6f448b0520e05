//! # Bootmem Ranges
//!
//! Typed physical memory ranges and the normalizer that turns a raw,
//! overlapping bootloader memory map into disjoint intervals.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         BOOTMEM RANGES                             │
//! │                                                                    │
//! │   bootloader map ──▶ MemoryRange[] ──┬──▶ free RAM sweep           │
//! │   (limine, mb2, uefi)                │    (no scratch, RAM only)   │
//! │                                      │                             │
//! │                                      └──▶ partition sweep          │
//! │                                           (4n words scratch,       │
//! │                                            every kind, conflicts)  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here allocates; results are handed to a visitor one at a time and
//! the visitor may stop the sweep early by returning `false`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bootmem_ranges::{find_free_ram_intervals, MemoryKind, MemoryRange};
//!
//! let mut map = [
//!     MemoryRange::from_bounds(0x0, 0xa0000, MemoryKind::FreeRam),
//!     MemoryRange::from_bounds(0x9f000, 0x100000, MemoryKind::Reserved),
//! ];
//! find_free_ram_intervals(&mut map, |range| {
//!     log::info!("RAM: {}", range);
//!     true
//! });
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Memory kind classification
pub mod kind;

/// Range type and interval helpers
pub mod range;

/// Free RAM extraction and full partition
pub mod normalize;

/// Error handling
pub mod error;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use crate::error::{NormalizeError, NormalizeResult};
pub use crate::kind::{ExtendedKind, MemoryKind};
pub use crate::normalize::{
    find_free_ram_intervals, find_free_ram_intervals_in, find_normalized_ranges, scratch_bytes,
    scratch_len, SweepEvent, MAX_SOURCES,
};
pub use crate::range::{align_down, align_up, MemoryRange};
