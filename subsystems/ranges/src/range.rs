//! # Memory Ranges
//!
//! A typed span of physical address space and the interval algebra the
//! normalizer and the pool are built on.
//!
//! Ranges are half-open: `[address, end)`. The end saturates at `u64::MAX`
//! because a range reported near the top of memory may overflow.

use core::fmt;

use crate::kind::MemoryKind;

// =============================================================================
// ALIGNMENT
// =============================================================================

/// Align `value` up to `align` (a power of two), `None` on overflow
#[inline]
pub const fn align_up(value: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Align `value` down to `align` (a power of two)
#[inline]
pub const fn align_down(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

// =============================================================================
// MEMORY RANGE
// =============================================================================

/// A typed span of physical memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct MemoryRange {
    /// First byte of the range
    pub address: u64,
    /// Length in bytes
    pub size: u64,
    /// Semantic kind
    pub kind: MemoryKind,
}

impl MemoryRange {
    /// Create a range
    #[inline]
    pub const fn new(address: u64, size: u64, kind: MemoryKind) -> Self {
        Self {
            address,
            size,
            kind,
        }
    }

    /// Create a range from `[start, end)`; an inverted pair yields an empty range
    #[inline]
    pub const fn from_bounds(start: u64, end: u64, kind: MemoryKind) -> Self {
        Self {
            address: start,
            size: end.saturating_sub(start),
            kind,
        }
    }

    /// Exclusive end, saturated at `u64::MAX`
    #[inline]
    pub const fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }

    /// True when the range covers no bytes
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.size == 0 || self.address == u64::MAX
    }

    /// Same span, different kind
    #[inline]
    pub const fn with_kind(self, kind: MemoryKind) -> Self {
        Self { kind, ..self }
    }

    /// Check if the range contains an address
    #[inline]
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.address && addr < self.end()
    }

    /// Check if the range fully contains `other`
    #[inline]
    pub const fn contains_range(&self, other: &Self) -> bool {
        other.address >= self.address && other.end() <= self.end()
    }

    /// Check if the two spans share at least one byte
    #[inline]
    pub const fn intersects(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.address < other.end()
            && other.address < self.end()
    }

    /// Check if one span ends exactly where the other begins
    #[inline]
    pub const fn is_adjacent(&self, other: &Self) -> bool {
        self.end() == other.address || other.end() == self.address
    }

    /// Shared span of the two ranges, keeping this range's kind
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }
        let start = self.address.max(other.address);
        let end = self.end().min(other.end());
        Some(Self::from_bounds(start, end, self.kind))
    }

    /// Lexicographic `(address, end)` key used by the normalizer
    #[inline]
    pub const fn sort_key(&self) -> (u64, u64) {
        (self.address, self.end())
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}-{:#x}) {}", self.address, self.end(), self.kind)
    }
}

// =============================================================================
// TESTS
// =============================================================================
