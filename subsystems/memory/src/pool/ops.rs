//! Allocation, release and bulk reclassification.

use bootmem_ranges::{MemoryKind, MemoryRange};

use super::Pool;
use crate::diag::HumanSize;
use crate::error::{PoolError, PoolResult};
use crate::memory::PhysicalMemory;

impl<M: PhysicalMemory> Pool<M> {
    /// Carve `size` bytes of free RAM and label them `kind`
    ///
    /// The returned address is aligned to `alignment`, lies at or above the
    /// null pointer region, and `address + size <= max_address`.
    ///
    /// # Panics
    ///
    /// Panics before `init`, for non-extended kinds, for a zero size, or for
    /// an alignment that is not a power of two.
    pub fn allocate(
        &mut self,
        kind: MemoryKind,
        size: u64,
        alignment: u64,
        max_address: u64,
    ) -> PoolResult<u64> {
        self.assert_initialized();
        assert!(kind.is_extended(), "Pool: cannot allocate '{kind}' memory");
        assert!(size > 0, "Pool: zero-sized allocation");
        assert!(
            alignment.is_power_of_two(),
            "Pool: alignment {alignment:#x} is not a power of two"
        );

        self.ensure_two_bookkeeping_nodes()?;

        let Some((address, id)) = self.find_fit(size, alignment, max_address) else {
            log::warn!(
                "Pool: no fit for {} of {} (align {:#x}, below {:#x})",
                HumanSize(size),
                kind,
                alignment,
                max_address
            );
            return Err(PoolError::NoFit {
                size,
                alignment,
                max_address,
            });
        };

        let id = self.insert_subrange(MemoryRange::new(address, size, kind), Some(id))?;
        self.coalesce(id);

        log::trace!("Pool: allocated {} of {} at {:#x}", HumanSize(size), kind, address);
        Ok(address)
    }

    /// Return `[address, address + size)` to free RAM
    ///
    /// Freeing memory that is already free is a no-op, so a double free
    /// leaves the pool unchanged. Memory below the null region end goes back
    /// to the null pointer region instead of free RAM.
    ///
    /// # Panics
    ///
    /// Panics before `init`, when the span is not inside a single tracked
    /// range, or when that range is not an allocation.
    pub fn free(&mut self, address: u64, size: u64) -> PoolResult<()> {
        self.assert_initialized();
        assert!(size > 0, "Pool: zero-sized free");

        let id = self.containing_node(address, size);
        let node = self.nodes.get(id);
        if matches!(node.kind, MemoryKind::FreeRam | MemoryKind::NullPointerRegion) {
            return Ok(());
        }
        assert!(
            node.kind.is_extended(),
            "Pool: cannot free '{}' memory at {:#x}",
            node.kind,
            address
        );

        self.ensure_two_bookkeeping_nodes()?;

        let id = self.containing_node(address, size);
        let released = MemoryRange::new(address, size, MemoryKind::FreeRam);
        let id = self.insert_subrange(released, Some(id))?;
        self.coalesce(id);

        let null_end = self.config.null_region_end;
        if address < null_end {
            self.update_free_ram_subranges(MemoryKind::NullPointerRegion, 0, null_end)?;
        }

        log::trace!("Pool: freed {} at {:#x}", HumanSize(size), address);
        Ok(())
    }

    /// Relabel every free RAM byte in `[address, address + size)` as `kind`
    ///
    /// Ranges of any other kind inside the span are left alone.
    ///
    /// # Panics
    ///
    /// Panics before `init` or when `kind` is `FreeRam`.
    pub fn update_free_ram_subranges(
        &mut self,
        kind: MemoryKind,
        address: u64,
        size: u64,
    ) -> PoolResult<()> {
        self.assert_initialized();
        assert!(!kind.is_free_ram(), "Pool: cannot relabel free RAM as free RAM");

        let end = address.saturating_add(size);
        let mut cursor = address;

        while cursor < end {
            let id = self.nodes.lower_bound(cursor);
            if id == self.nodes.len() {
                break;
            }
            let node = self.nodes.get(id);
            if node.address >= end {
                break;
            }
            if !node.kind.is_free_ram() {
                cursor = node.end();
                continue;
            }

            self.ensure_two_bookkeeping_nodes()?;

            // Growing the bookkeeping may have carved this very node.
            let id = self.nodes.lower_bound(cursor);
            if self.nodes.get(id) != node {
                continue;
            }

            let piece = MemoryRange::from_bounds(node.address.max(cursor), node.end().min(end), kind);
            let id = self.insert_subrange(piece, Some(id))?;
            self.coalesce(id);
            cursor = piece.end();
        }

        Ok(())
    }
}
