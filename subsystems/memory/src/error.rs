//! # Error Types
//!
//! Errors returned by the pool.
//!
//! Misuse of the API (freeing untracked memory, labelling an allocation with a
//! basic kind, using the pool before `init`) panics instead of returning an
//! error. What is returned here is either bad input data or exhaustion.

use core::fmt;

use bootmem_ranges::NormalizeError;

// =============================================================================
// ERROR CLASS
// =============================================================================

/// Broad classification of a [`PoolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller supplied inconsistent data or configuration
    ContractViolation,
    /// The pool ran out of memory or bookkeeping storage
    ResourceExhausted,
}

impl ErrorClass {
    /// Get class name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ContractViolation => "Contract",
            Self::ResourceExhausted => "Resource",
        }
    }
}

// =============================================================================
// POOL ERROR
// =============================================================================

/// Pool errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// No free RAM interval can hold the initial bookkeeping region
    NoBookkeepingSpace {
        /// Bytes required
        required: u64,
    },
    /// No free RAM satisfies the request
    NoFit {
        /// Requested size
        size: u64,
        /// Requested alignment
        alignment: u64,
        /// Highest permitted end address
        max_address: u64,
    },
    /// Not enough spare nodes to split a range
    OutOfBookkeeping {
        /// Nodes needed
        needed: usize,
        /// Nodes available
        available: usize,
    },
    /// Configuration rejected by `PoolConfig::validate`
    InvalidConfig(&'static str),
    /// The input memory map could not be normalized
    Normalize(NormalizeError),
}

impl PoolError {
    /// Classify the error
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::NoBookkeepingSpace { .. } | Self::NoFit { .. } | Self::OutOfBookkeeping { .. } => {
                ErrorClass::ResourceExhausted
            },
            Self::InvalidConfig(_) | Self::Normalize(_) => ErrorClass::ContractViolation,
        }
    }

    /// Check if the caller can retry with a different request
    pub const fn is_recoverable(&self) -> bool {
        matches!(self.class(), ErrorClass::ResourceExhausted)
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.class().name())?;
        match self {
            Self::NoBookkeepingSpace { required } => {
                write!(f, "No free RAM for {required:#x} bytes of bookkeeping")
            },
            Self::NoFit {
                size,
                alignment,
                max_address,
            } => write!(
                f,
                "No fit for {size:#x} bytes aligned to {alignment:#x} below {max_address:#x}"
            ),
            Self::OutOfBookkeeping { needed, available } => {
                write!(f, "Out of bookkeeping nodes: need {needed}, have {available}")
            },
            Self::InvalidConfig(reason) => write!(f, "Invalid configuration: {reason}"),
            Self::Normalize(err) => write!(f, "{err}"),
        }
    }
}

impl From<NormalizeError> for PoolError {
    fn from(err: NormalizeError) -> Self {
        Self::Normalize(err)
    }
}

/// Result type for pool operations
pub type PoolResult<T> = core::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bootmem_ranges::MemoryKind;

    #[test]
    fn test_error_classes() {
        assert!(PoolError::NoBookkeepingSpace { required: 0x1000 }.is_recoverable());
        assert!(PoolError::OutOfBookkeeping {
            needed: 2,
            available: 0
        }
        .is_recoverable());
        assert_eq!(
            PoolError::InvalidConfig("bad").class(),
            ErrorClass::ContractViolation
        );

        let conflict: PoolError = NormalizeError::TypeConflict {
            address: 0,
            first: MemoryKind::KERNEL_IMAGE,
            second: MemoryKind::Reserved,
        }
        .into();
        assert!(!conflict.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = PoolError::NoFit {
            size: 0x2000,
            alignment: 0x1000,
            max_address: 0x100000,
        };
        let s = format!("{}", err);
        assert!(s.starts_with("[Resource]"));
        assert!(s.contains("0x2000"));
        assert!(s.contains("0x100000"));
    }
}
