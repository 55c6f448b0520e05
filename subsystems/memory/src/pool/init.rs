//! Pool initialization: place the bookkeeping region, normalize the map into
//! it, then withhold the null pointer region.

use core::mem::size_of;

use bootmem_ranges::{
    align_up, find_free_ram_intervals_in, find_normalized_ranges, scratch_bytes, scratch_len,
    MemoryKind, MemoryRange,
};

use super::Pool;
use crate::diag::HumanSize;
use crate::error::{PoolError, PoolResult};
use crate::memory::PhysicalMemory;
use crate::node::{self, Node, NodeArena, Slab};

/// Nodes reserved for an `n`-range input
///
/// A partition of `n` ranges has at most `2n - 1` pieces.
#[inline]
pub const fn node_capacity(n: usize) -> usize {
    2 * n
}

/// Bytes of the initial bookkeeping region for an `n`-range input
///
/// Node slots followed by the normalizer scratch, rounded up to whole chunks.
pub const fn bookkeeping_size(n: usize, chunk_size: u64) -> u64 {
    let bytes = (node_capacity(n) * size_of::<Node>() + scratch_bytes(n)) as u64;
    let bytes = if bytes == 0 { 1 } else { bytes };
    match align_up(bytes, chunk_size) {
        Some(size) => size,
        None => u64::MAX,
    }
}

impl<M: PhysicalMemory> Pool<M> {
    /// Build the pool from one or more bootloader range arrays
    ///
    /// Every source is sorted in place. On error the pool stays
    /// uninitialized and may be initialized again.
    ///
    /// # Panics
    ///
    /// Panics if the pool is already initialized, or if `sources` holds more
    /// than [`MAX_SOURCES`](bootmem_ranges::MAX_SOURCES) arrays.
    pub fn init<S>(&mut self, sources: &mut [S]) -> PoolResult<()>
    where
        S: AsMut<[MemoryRange]> + AsRef<[MemoryRange]>,
    {
        assert!(!self.initialized, "Pool: init called twice");
        self.config.validate()?;

        let n: usize = sources.iter().map(|source| source.as_ref().len()).sum();
        let required = bookkeeping_size(n, self.config.chunk_size);
        let Some(region) = self.find_bookkeeping_region(sources, required) else {
            log::warn!(
                "Pool: no free RAM for {} of bookkeeping ({} input ranges)",
                HumanSize(required),
                n
            );
            return Err(PoolError::NoBookkeepingSpace { required });
        };
        log::debug!(
            "Pool: bookkeeping at {:#x} ({})",
            region,
            HumanSize(required)
        );

        let nodes = self.normalize_into(region, required, sources, n)?;
        self.nodes = nodes;
        self.initialized = true;

        if let Err(err) = self.track_initial_regions(region, required) {
            self.reset();
            return Err(err);
        }

        log::info!(
            "Pool: initialized with {} ranges, {} spare nodes",
            self.nodes.len(),
            self.nodes.spare()
        );
        Ok(())
    }

    /// First chunk-aligned spot above the null region with `required` bytes of free RAM
    fn find_bookkeeping_region<S>(&self, sources: &mut [S], required: u64) -> Option<u64>
    where
        S: AsMut<[MemoryRange]> + AsRef<[MemoryRange]>,
    {
        let chunk = self.config.chunk_size;
        let null_end = self.config.null_region_end;
        let mut found = None;

        find_free_ram_intervals_in(sources, |interval| {
            let start = align_up(interval.address.max(null_end), chunk);
            let fits = start.is_some_and(|start| {
                interval
                    .end()
                    .checked_sub(start)
                    .is_some_and(|room| room >= required)
            });
            if fits {
                found = start;
            }
            !fits
        });

        found
    }

    /// Format the bookkeeping region and fill it with the normalized map
    fn normalize_into<S>(
        &mut self,
        region: u64,
        size: u64,
        sources: &[S],
        n: usize,
    ) -> PoolResult<NodeArena>
    where
        S: AsRef<[MemoryRange]>,
    {
        let size = size as usize;
        let scratch_size = scratch_bytes(n);
        let node_size = size - scratch_size;
        let scratch_address = region + node_size as u64;

        // SAFETY: the region is free RAM of `size` bytes that nothing tracks yet.
        let base = unsafe { self.memory.map(region, size as u64) };

        let mut nodes = NodeArena::new();
        // SAFETY: the prefix is the first `node_size` bytes of the exclusive
        // region and starts at the mapped base.
        let prefix = unsafe { Slab::format(region, base, node_size) };
        if nodes.add_slab(prefix).is_err() {
            unreachable!("empty arena rejected a slab");
        }
        // SAFETY: `node_size` is within the region; the suffix stays 8-byte
        // aligned because `node_size` is a multiple of 8.
        let scratch_ptr = unsafe { base.add(node_size) };

        {
            // SAFETY: the suffix is disjoint from the prefix slab and holds
            // exactly `scratch_len(n)` events; the slice dies with this block.
            let scratch = unsafe { node::format_scratch(scratch_ptr, scratch_len(n)) };
            let mut overflow = false;
            find_normalized_ranges(sources, scratch, |range| {
                overflow = nodes.push(range).is_err();
                !overflow
            })?;
            assert!(!overflow, "Pool: normalized map exceeds node capacity");
        }

        // SAFETY: the scratch slice is gone, so the suffix is exclusive again
        // and can be recycled as node storage.
        let suffix = unsafe { Slab::format(scratch_address, scratch_ptr, scratch_size) };
        if nodes.add_slab(suffix).is_err() {
            unreachable!("second slab rejected");
        }

        Ok(nodes)
    }

    fn track_initial_regions(&mut self, region: u64, size: u64) -> PoolResult<()> {
        let bookkeeping = MemoryRange::new(region, size, MemoryKind::PoolBookkeeping);
        let id = self.insert_subrange(bookkeeping, None)?;
        self.coalesce(id);

        let null_end = self.config.null_region_end;
        self.update_free_ram_subranges(MemoryKind::NullPointerRegion, 0, null_end)
    }
}
