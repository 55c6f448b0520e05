//! # Node Storage
//!
//! Nodes live in slabs carved out of `PoolBookkeeping` memory. The arena
//! addresses them by logical index across all slabs:
//!
//! ```text
//!   slab 0 (init prefix)     slab 1 (init scratch)   slab 2 (replenished chunk)
//! ┌────────────────────────┬──────────────────────┬────────────────────────────┐
//! │ 0 1 2 3 ... │          │                      │                            │
//! │  active     │  spare ─────────────────────────────────────────────────────▶│
//! └────────────────────────┴──────────────────────┴────────────────────────────┘
//!   [0, len) is the sorted range list, [len, capacity) is unused storage
//! ```
//!
//! Inserting or removing shifts the tail of the active list by one slot, so
//! the list stays sorted without per-node links.

use core::mem::{align_of, size_of, MaybeUninit};
use core::ptr::{self, NonNull};
use core::slice;

use bootmem_ranges::{MemoryRange, SweepEvent};
use heapless::Vec;
use static_assertions::const_assert;

use crate::config::BOOKKEEPING_CHUNK_SIZE;

/// A tracked range as stored in bookkeeping memory
pub type Node = MemoryRange;

/// Maximum number of slabs the arena can address
pub const MAX_SLABS: usize = 128;

const_assert!(BOOKKEEPING_CHUNK_SIZE as usize % align_of::<Node>() == 0);
const_assert!(align_of::<SweepEvent>() <= 8);
const_assert!(align_of::<Node>() <= 8);
static_assertions::assert_impl_all!(Node: Copy);

// =============================================================================
// SLAB
// =============================================================================

/// A run of node slots in bookkeeping memory
#[derive(Debug)]
pub struct Slab {
    /// Physical address of the first byte
    address: u64,
    base: NonNull<MaybeUninit<Node>>,
    bytes: usize,
}

impl Slab {
    /// Zero `bytes` bytes at `ptr` and view them as node slots
    ///
    /// `address` is the physical address `ptr` maps.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes of `bytes` bytes, aligned to 8 bytes,
    /// and exclusively owned by the pool for as long as the slab is in use.
    pub unsafe fn format(address: u64, ptr: *mut u8, bytes: usize) -> Self {
        debug_assert_eq!(ptr as usize % align_of::<Node>(), 0);
        // SAFETY: caller guarantees `ptr` is writable for `bytes` bytes.
        unsafe { ptr::write_bytes(ptr, 0, bytes) };

        Self {
            address,
            base: NonNull::new(ptr.cast()).unwrap_or(NonNull::dangling()),
            bytes,
        }
    }

    /// Number of node slots
    pub const fn capacity(&self) -> usize {
        self.bytes / size_of::<Node>()
    }

    fn end_ptr(&self) -> *mut u8 {
        self.base.as_ptr().cast::<u8>().wrapping_add(self.bytes)
    }

    /// True when `ptr` mapping `address` starts right where the slab ends,
    /// both physically and in the mapping
    fn is_followed_by(&self, address: u64, ptr: *mut u8) -> bool {
        self.address.checked_add(self.bytes as u64) == Some(address) && ptr::eq(self.end_ptr(), ptr)
    }

    /// Zero `bytes` more bytes past the end and take them as node slots
    ///
    /// # Safety
    ///
    /// Same contract as [`Slab::format`] for the bytes following the slab.
    unsafe fn extend(&mut self, bytes: usize) {
        // SAFETY: caller guarantees the bytes after the slab are writable.
        unsafe { ptr::write_bytes(self.end_ptr(), 0, bytes) };
        self.bytes += bytes;
    }

    fn slot(&self, offset: usize) -> *mut MaybeUninit<Node> {
        debug_assert!(offset < self.capacity());
        // SAFETY: offset is within the slab.
        unsafe { self.base.as_ptr().add(offset) }
    }
}

/// View zeroed bytes as sweep events for the normalizer
///
/// # Safety
///
/// Same contract as [`Slab::format`] for `count * size_of::<SweepEvent>()`
/// bytes; the returned slice must be dropped before the bytes are reused.
pub unsafe fn format_scratch<'a>(ptr: *mut u8, count: usize) -> &'a mut [SweepEvent] {
    let bytes = count * size_of::<SweepEvent>();
    debug_assert_eq!(ptr as usize % align_of::<SweepEvent>(), 0);
    // SAFETY: caller guarantees the region is writable and exclusively owned.
    // An all-zero SweepEvent is its Default value.
    unsafe {
        ptr::write_bytes(ptr, 0, bytes);
        slice::from_raw_parts_mut(ptr.cast::<SweepEvent>(), count)
    }
}

// =============================================================================
// NODE ARENA
// =============================================================================

/// Sorted node list spread over bookkeeping slabs
#[derive(Debug)]
pub struct NodeArena {
    slabs: Vec<Slab, MAX_SLABS>,
    /// First logical index of each slab
    starts: Vec<usize, MAX_SLABS>,
    len: usize,
    capacity: usize,
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeArena {
    /// Create an arena without storage
    pub const fn new() -> Self {
        Self {
            slabs: Vec::new(),
            starts: Vec::new(),
            len: 0,
            capacity: 0,
        }
    }

    /// Active nodes
    pub const fn len(&self) -> usize {
        self.len
    }

    /// No active nodes
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unused node slots
    pub const fn spare(&self) -> usize {
        self.capacity - self.len
    }

    /// Number of slabs
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    /// Append a slab, handing it back if the directory is full
    pub fn add_slab(&mut self, slab: Slab) -> Result<(), Slab> {
        if self.slabs.is_full() {
            return Err(slab);
        }
        let capacity = slab.capacity();
        // Both directories have the same capacity and length.
        let _ = self.starts.push(self.capacity);
        self.slabs.push(slab)?;
        self.capacity += capacity;
        Ok(())
    }

    /// Take `bytes` of bookkeeping memory at `ptr` as node storage
    ///
    /// Memory that directly follows the last slab extends it in place;
    /// anything else takes a new directory entry. Returns false, leaving the
    /// memory untouched, when the directory is full.
    ///
    /// # Safety
    ///
    /// Same contract as [`Slab::format`].
    pub unsafe fn grow(&mut self, address: u64, ptr: *mut u8, bytes: usize) -> bool {
        if let Some(last) = self.slabs.last_mut() {
            if last.is_followed_by(address, ptr) {
                let before = last.capacity();
                // SAFETY: forwarded from the caller.
                unsafe { last.extend(bytes) };
                self.capacity += last.capacity() - before;
                return true;
            }
        }
        if self.slabs.is_full() {
            return false;
        }
        // SAFETY: forwarded from the caller.
        let slab = unsafe { Slab::format(address, ptr, bytes) };
        self.add_slab(slab).is_ok()
    }

    fn slot(&self, index: usize) -> *mut MaybeUninit<Node> {
        let slab = self.starts.partition_point(|&start| start <= index) - 1;
        self.slabs[slab].slot(index - self.starts[slab])
    }

    /// Read an active node
    pub fn get(&self, index: usize) -> Node {
        assert!(index < self.len, "node {index} out of bounds ({})", self.len);
        // SAFETY: every index below len has been written.
        unsafe { (*self.slot(index)).assume_init() }
    }

    /// Overwrite an active node
    pub fn set(&mut self, index: usize, node: Node) {
        assert!(index < self.len, "node {index} out of bounds ({})", self.len);
        self.write(index, node);
    }

    fn write(&mut self, index: usize, node: Node) {
        // SAFETY: index is below capacity, so the slot lies in a live slab.
        unsafe { (*self.slot(index)).write(node) };
    }

    /// Append a node, handing it back when no slot is left
    pub fn push(&mut self, node: Node) -> Result<(), Node> {
        if self.len == self.capacity {
            return Err(node);
        }
        self.write(self.len, node);
        self.len += 1;
        Ok(())
    }

    /// Insert a node at `index`, shifting later nodes up
    pub fn insert(&mut self, index: usize, node: Node) {
        assert!(index <= self.len, "insert at {index} past {}", self.len);
        assert!(self.len < self.capacity, "no spare node for insert");

        for i in (index..self.len).rev() {
            let moved = self.get(i);
            self.write(i + 1, moved);
        }
        self.write(index, node);
        self.len += 1;
    }

    /// Remove the node at `index`, shifting later nodes down
    pub fn remove(&mut self, index: usize) -> Node {
        let removed = self.get(index);
        for i in index + 1..self.len {
            let moved = self.get(i);
            self.write(i - 1, moved);
        }
        self.len -= 1;
        removed
    }

    /// First active node whose end lies past `address`
    pub fn lower_bound(&self, address: u64) -> usize {
        let (mut lo, mut hi) = (0, self.len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.get(mid).end() <= address {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Iterate over active nodes in order
    pub fn iter(&self) -> impl Iterator<Item = Node> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}

// =============================================================================
// TESTS
// =============================================================================
