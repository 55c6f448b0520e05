//! Structural primitives. `insert_subrange` is the only place that splits
//! nodes and `coalesce` the only place that releases them.

use bootmem_ranges::{align_up, MemoryKind, MemoryRange};

use super::{NodeId, Pool};
use crate::diag::HumanSize;
use crate::error::{PoolError, PoolResult};
use crate::memory::PhysicalMemory;

/// Slabs added between two doublings of the growth request
const SLABS_PER_DOUBLING: usize = 8;

impl<M: PhysicalMemory> Pool<M> {
    /// Node fully containing `[address, address + size)`
    pub(crate) fn get_containing_node(&self, address: u64, size: u64) -> Option<NodeId> {
        let id = self.nodes.lower_bound(address);
        if id == self.nodes.len() {
            return None;
        }
        let span = MemoryRange::new(address, size, MemoryKind::FreeRam);
        self.nodes.get(id).contains_range(&span).then_some(id)
    }

    /// Like `get_containing_node` for spans the caller knows are tracked
    pub(crate) fn containing_node(&self, address: u64, size: u64) -> NodeId {
        match self.get_containing_node(address, size) {
            Some(id) => id,
            None => panic!(
                "Pool: [{:#x}-{:#x}) is not inside a single tracked range",
                address,
                address.saturating_add(size)
            ),
        }
    }

    /// Relabel `range`, splitting the node that contains it
    ///
    /// Returns the node now holding `range`. Fails without touching the list
    /// when the split needs more spare nodes than are available.
    pub(crate) fn insert_subrange(
        &mut self,
        range: MemoryRange,
        containing: Option<NodeId>,
    ) -> PoolResult<NodeId> {
        let id = match containing {
            Some(id) => id,
            None => self.containing_node(range.address, range.size),
        };
        let node = self.nodes.get(id);
        debug_assert!(node.contains_range(&range));

        let split_left = range.address > node.address;
        let split_right = range.end() < node.end();
        let needed = usize::from(split_left) + usize::from(split_right);
        if self.nodes.spare() < needed {
            return Err(PoolError::OutOfBookkeeping {
                needed,
                available: self.nodes.spare(),
            });
        }

        let head = MemoryRange::from_bounds(node.address, range.address, node.kind);
        let tail = MemoryRange::from_bounds(range.end(), node.end(), node.kind);

        match (split_left, split_right) {
            (false, false) => {
                self.nodes.set(id, range);
                Ok(id)
            },
            (false, true) => {
                self.nodes.set(id, range);
                self.nodes.insert(id + 1, tail);
                Ok(id)
            },
            (true, false) => {
                self.nodes.set(id, head);
                self.nodes.insert(id + 1, range);
                Ok(id + 1)
            },
            (true, true) => {
                self.nodes.set(id, head);
                self.nodes.insert(id + 1, range);
                self.nodes.insert(id + 2, tail);
                Ok(id + 1)
            },
        }
    }

    /// Merge `id` with same-kind neighbours, returning the surviving node
    pub(crate) fn coalesce(&mut self, id: NodeId) -> NodeId {
        let mut id = id;
        let node = self.nodes.get(id);

        if id + 1 < self.nodes.len() {
            let next = self.nodes.get(id + 1);
            if next.kind == node.kind && node.end() == next.address {
                self.nodes
                    .set(id, MemoryRange::from_bounds(node.address, next.end(), node.kind));
                self.nodes.remove(id + 1);
            }
        }

        if id > 0 {
            let prev = self.nodes.get(id - 1);
            let node = self.nodes.get(id);
            if prev.kind == node.kind && prev.end() == node.address {
                self.nodes
                    .set(id - 1, MemoryRange::from_bounds(prev.address, node.end(), node.kind));
                self.nodes.remove(id);
                id -= 1;
            }
        }

        id
    }

    /// First-fit search over free RAM
    ///
    /// The start never drops below the null region and `start + size` never
    /// exceeds `max_address`. Returns the start and the containing node.
    pub(crate) fn find_fit(&self, size: u64, alignment: u64, max_address: u64) -> Option<(u64, NodeId)> {
        let null_end = self.config.null_region_end;
        let limit = max_address.checked_sub(size)?;

        for (id, node) in self.nodes.iter().enumerate() {
            if !node.kind.is_free_ram() {
                continue;
            }
            let start = align_up(node.address.max(null_end), alignment)?;
            // Nodes are sorted, so no later node can start lower.
            if start > limit {
                break;
            }
            if start.checked_add(size).is_some_and(|end| end <= node.end()) {
                return Some((start, id));
            }
        }

        None
    }

    /// Keep at least two spare nodes around
    ///
    /// Grows the bookkeeping by at least one chunk taken from free RAM.
    /// Running out of free RAM is not an error here; the split that needs the
    /// nodes reports `OutOfBookkeeping` instead.
    pub(crate) fn ensure_two_bookkeeping_nodes(&mut self) -> PoolResult<()> {
        if self.nodes.spare() >= 2 {
            return Ok(());
        }

        let chunk = self.config.chunk_size;
        let mut size = self.growth_size();
        let (address, id) = loop {
            if let Some(fit) = self.find_fit(size, chunk, u64::MAX) {
                break fit;
            }
            if size <= chunk {
                log::warn!("Pool: no free RAM to grow bookkeeping");
                return Ok(());
            }
            size /= 2;
        };

        // SAFETY: the region is free RAM owned by the pool and about to be
        // tracked as bookkeeping; `growth_size` keeps `size` within usize.
        let grown = unsafe {
            let base = self.memory.map(address, size);
            self.nodes.grow(address, base, size as usize)
        };
        if !grown {
            log::warn!("Pool: slab directory full, cannot grow bookkeeping");
            return Ok(());
        }

        let range = MemoryRange::new(address, size, MemoryKind::PoolBookkeeping);
        let id = self.insert_subrange(range, Some(id))?;
        self.coalesce(id);

        log::debug!(
            "Pool: bookkeeping grew by {} at {:#x}, {} spare nodes",
            HumanSize(size),
            address,
            self.nodes.spare()
        );
        Ok(())
    }

    /// Bytes the next bookkeeping growth asks for
    ///
    /// One chunk at first, doubling every `SLABS_PER_DOUBLING` slabs so the
    /// fixed slab directory never caps the number of nodes.
    pub(crate) fn growth_size(&self) -> u64 {
        let chunk = self.config.chunk_size;
        let shift = (self.nodes.slab_count() / SLABS_PER_DOUBLING) as u32;
        1u64.checked_shl(shift)
            .and_then(|factor| chunk.checked_mul(factor))
            .filter(|&size| usize::try_from(size).is_ok())
            .unwrap_or(chunk)
    }
}
