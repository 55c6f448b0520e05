//! # Diagnostics
//!
//! Human readable views of the pool: a line-per-range dump, per-kind byte
//! totals, and a size formatter shared by the log messages.
//!
//! ```text
//! [0x0000000000000000-0x0000000000010000)   64 KiB  null pointer region
//! [0x0000000000010000-0x0000000000011000)    4 KiB  pool bookkeeping
//! [0x0000000000011000-0x000000000009f000)  568 KiB  free RAM
//! ```

use core::fmt::{self, Write};

use bootmem_ranges::MemoryKind;

use crate::memory::PhysicalMemory;
use crate::pool::Pool;

// =============================================================================
// HUMAN SIZE
// =============================================================================

/// Byte count formatted with a binary unit, e.g. `1.5 MiB`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanSize(pub u64);

impl fmt::Display for HumanSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

        let bytes = self.0;
        let mut unit = 0;
        while unit + 1 < UNITS.len() && bytes >> (10 * (unit + 1)) > 0 {
            unit += 1;
        }
        let shift = 10 * unit;
        let whole = bytes >> shift;
        let tenths = if shift == 0 {
            0
        } else {
            ((bytes & ((1u64 << shift) - 1)) * 10) >> shift
        };

        // Rendered first so width and alignment flags apply to the whole text
        let mut text = heapless::String::<24>::new();
        if tenths == 0 {
            write!(text, "{} {}", whole, UNITS[unit])?;
        } else {
            write!(text, "{}.{} {}", whole, tenths, UNITS[unit])?;
        }
        f.pad(&text)
    }
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Bytes per kind class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Free RAM
    pub free_ram: u64,
    /// Reserved memory
    pub reserved: u64,
    /// Device memory
    pub peripheral: u64,
    /// Memory held by extended-kind allocations
    pub allocated: u64,
    /// Memory holding the pool's own nodes
    pub bookkeeping: u64,
    /// Withheld null pointer region
    pub null_region: u64,
    /// Tracked ranges
    pub entries: usize,
    /// Unused node slots
    pub spare_nodes: usize,
    /// Bookkeeping slabs in use
    pub slabs: usize,
}

impl PoolStats {
    /// Bytes of RAM, free or in use
    pub const fn total_ram(&self) -> u64 {
        self.free_ram + self.allocated + self.bookkeeping + self.null_region
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Free RAM:     {}", HumanSize(self.free_ram))?;
        writeln!(f, "Allocated:    {}", HumanSize(self.allocated))?;
        writeln!(f, "Bookkeeping:  {}", HumanSize(self.bookkeeping))?;
        writeln!(f, "Null region:  {}", HumanSize(self.null_region))?;
        writeln!(f, "Reserved:     {}", HumanSize(self.reserved))?;
        writeln!(f, "Peripheral:   {}", HumanSize(self.peripheral))?;
        write!(
            f,
            "Entries:      {} ({} spare nodes in {} slabs)",
            self.entries, self.spare_nodes, self.slabs
        )
    }
}

// =============================================================================
// DUMP
// =============================================================================

/// Line-per-range view of a pool
#[derive(Debug)]
pub struct PoolDump<'a, M: PhysicalMemory> {
    pool: &'a Pool<M>,
}

impl<M: PhysicalMemory> fmt::Display for PoolDump<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for range in self.pool.ranges() {
            writeln!(
                f,
                "[{:#018x}-{:#018x}) {:>10}  {}",
                range.address,
                range.end(),
                HumanSize(range.size),
                range.kind
            )?;
        }
        Ok(())
    }
}

impl<M: PhysicalMemory> Pool<M> {
    /// Bytes per kind class
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            entries: self.len(),
            spare_nodes: self.spare_nodes(),
            slabs: self.slab_count(),
            ..PoolStats::default()
        };

        for range in self.ranges() {
            let total = match range.kind {
                MemoryKind::FreeRam => &mut stats.free_ram,
                MemoryKind::Reserved => &mut stats.reserved,
                MemoryKind::Peripheral => &mut stats.peripheral,
                MemoryKind::PoolBookkeeping => &mut stats.bookkeeping,
                MemoryKind::NullPointerRegion => &mut stats.null_region,
                MemoryKind::Extended(_) => &mut stats.allocated,
            };
            *total += range.size;
        }

        stats
    }

    /// Displayable dump of every tracked range
    pub fn dump(&self) -> PoolDump<'_, M> {
        PoolDump { pool: self }
    }

    /// Log every tracked range at info level
    pub fn log_ranges(&self) {
        log::info!("Pool: {} ranges", self.len());
        for range in self.ranges() {
            log::info!(
                "Pool:   [{:#018x}-{:#018x}) {:>10}  {}",
                range.address,
                range.end(),
                HumanSize(range.size),
                range.kind
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SparseMemory;
    use bootmem_ranges::MemoryRange;

    #[test]
    fn test_human_size() {
        assert_eq!(format!("{}", HumanSize(0)), "0 B");
        assert_eq!(format!("{}", HumanSize(1023)), "1023 B");
        assert_eq!(format!("{}", HumanSize(0x1000)), "4 KiB");
        assert_eq!(format!("{}", HumanSize(0x18_0000)), "1.5 MiB");
        assert_eq!(format!("{}", HumanSize(1 << 30)), "1 GiB");
        assert_eq!(format!("{:>8}", HumanSize(0x1000)), "   4 KiB");
    }

    fn small_pool() -> Pool<SparseMemory> {
        let mut pool = Pool::with_defaults(SparseMemory::new());
        let mut map = [
            MemoryRange::from_bounds(0, 0x9f000, MemoryKind::FreeRam),
            MemoryRange::from_bounds(0x9f000, 0x100000, MemoryKind::Reserved),
            MemoryRange::from_bounds(0xfee00000, 0xfee01000, MemoryKind::Peripheral),
        ];
        pool.init(&mut [&mut map[..]]).unwrap();
        pool
    }

    #[test]
    fn test_stats() {
        let mut pool = small_pool();
        pool.allocate(MemoryKind::PAGE_TABLES, 0x2000, 0x1000, u64::MAX)
            .unwrap();

        let stats = pool.stats();
        assert_eq!(stats.null_region, 0x10000);
        assert_eq!(stats.bookkeeping, 0x1000);
        assert_eq!(stats.allocated, 0x2000);
        assert_eq!(stats.reserved, 0x61000);
        assert_eq!(stats.peripheral, 0x1000);
        assert_eq!(stats.total_ram(), 0x9f000);
        assert_eq!(stats.entries, 6);
        assert_eq!(stats.slabs, 2);
        assert!(format!("{}", stats).contains("Allocated:    8 KiB"));
    }

    #[test]
    fn test_dump_lines() {
        let pool = small_pool();
        let dump = format!("{}", pool.dump());
        let lines: Vec<&str> = dump.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("[0x0000000000000000-0x0000000000010000)"));
        assert!(lines[0].ends_with("null pointer region"));
        assert!(lines[1].contains("4 KiB"));
        assert!(lines[2].ends_with("free RAM"));
        assert!(lines[4].ends_with("peripheral"));
    }
}
