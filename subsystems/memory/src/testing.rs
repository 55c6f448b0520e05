//! Host stand-in for physical memory used by the pool tests.

use std::collections::BTreeMap;

use crate::memory::PhysicalMemory;

/// Backs each mapped physical range with its own zeroed host buffer
///
/// Buffers carry one spare trailing word, so two of them never look
/// contiguous to the pool.
#[derive(Debug, Default)]
pub struct SparseMemory {
    regions: BTreeMap<u64, Box<[u64]>>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Physical start and length of every mapped range
    pub fn mapped(&self) -> Vec<(u64, u64)> {
        self.regions
            .iter()
            .map(|(&address, buffer)| (address, (buffer.len() as u64 - 1) * 8))
            .collect()
    }
}

impl PhysicalMemory for SparseMemory {
    unsafe fn map(&mut self, address: u64, len: u64) -> *mut u8 {
        let words = len.div_ceil(8) as usize;
        let buffer = self
            .regions
            .entry(address)
            .or_insert_with(|| vec![0u64; words + 1].into_boxed_slice());
        assert!(buffer.len() > words, "remapped {address:#x} with a larger length");
        buffer.as_mut_ptr().cast()
    }
}

/// One host buffer standing in for a contiguous physical window, so
/// neighbouring physical ranges are also neighbours in the mapping
#[derive(Debug)]
pub struct FlatMemory {
    base: u64,
    words: Box<[u64]>,
}

impl FlatMemory {
    pub fn new(base: u64, len: u64) -> Self {
        Self {
            base,
            words: vec![0u64; len.div_ceil(8) as usize].into_boxed_slice(),
        }
    }
}

impl PhysicalMemory for FlatMemory {
    unsafe fn map(&mut self, address: u64, len: u64) -> *mut u8 {
        let offset = address - self.base;
        assert!(
            offset + len <= self.words.len() as u64 * 8,
            "[{address:#x}+{len:#x}) outside the window"
        );
        self.words.as_mut_ptr().cast::<u8>().wrapping_add(offset as usize)
    }
}
