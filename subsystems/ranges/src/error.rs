//! # Error Types
//!
//! Errors reported while normalizing a raw memory map.

use core::fmt;

use crate::kind::MemoryKind;

/// Normalization errors
///
/// All variants describe malformed caller input; none of them is retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeError {
    /// Two ranges overlap in a way that cannot be resolved by precedence
    TypeConflict {
        /// First address covered by both ranges
        address: u64,
        /// Kind already covering the address
        first: MemoryKind,
        /// Kind that started overlapping it
        second: MemoryKind,
    },
    /// An input range carries a kind owned by the pool
    InternalKind {
        /// Start of the offending range
        address: u64,
        /// The internal kind
        kind: MemoryKind,
    },
    /// Scratch buffer shorter than `scratch_len(n)`
    ScratchTooSmall {
        /// Events needed
        required: usize,
        /// Events provided
        provided: usize,
    },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeConflict {
                address,
                first,
                second,
            } => write!(f, "Conflicting kinds at {address:#x}: {first} overlaps {second}"),
            Self::InternalKind { address, kind } => {
                write!(f, "Input range at {address:#x} uses internal kind '{kind}'")
            },
            Self::ScratchTooSmall { required, provided } => {
                write!(f, "Scratch too small: need {required} events, got {provided}")
            },
        }
    }
}

/// Result type for normalization
pub type NormalizeResult<T> = core::result::Result<T, NormalizeError>;
