//! # Physical Memory Access
//!
//! The pool stores its nodes inside the physical memory it tracks, so it
//! needs a way to turn a physical range into a writable pointer. Early boot
//! code usually runs identity mapped or behind a higher-half direct map.

/// Translation from physical ranges to writable pointers
pub trait PhysicalMemory {
    /// Return a pointer through which `[address, address + len)` can be written
    ///
    /// # Safety
    ///
    /// The caller guarantees the range is RAM that nothing else uses. The
    /// returned pointer must stay valid, writable and aligned to at least
    /// 8 bytes for as long as the pool exists.
    unsafe fn map(&mut self, address: u64, len: u64) -> *mut u8;
}

/// Linear mapping with a fixed virtual offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectMap {
    offset: u64,
}

impl DirectMap {
    /// Physical addresses are virtual addresses
    pub const fn identity() -> Self {
        Self { offset: 0 }
    }

    /// Physical memory is mapped at `offset`
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    /// Virtual offset of the mapping
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

impl PhysicalMemory for DirectMap {
    unsafe fn map(&mut self, address: u64, _len: u64) -> *mut u8 {
        address.wrapping_add(self.offset) as usize as *mut u8
    }
}
