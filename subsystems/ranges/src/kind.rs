//! # Memory Kinds
//!
//! Semantic classification of physical memory.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        MEMORY KINDS                          │
//! ├──────────────────────┬───────────────────────────────────────┤
//! │  Basic input kinds   │  FreeRam, Reserved, Peripheral        │
//! │  (bootloader map)    │                                       │
//! ├──────────────────────┼───────────────────────────────────────┤
//! │  Internal kinds      │  PoolBookkeeping, NullPointerRegion   │
//! │  (pool owned)        │                                       │
//! ├──────────────────────┼───────────────────────────────────────┤
//! │  Extended kinds      │  Extended(id): kernel image, boot     │
//! │  (allocation labels) │  data, page tables, ...               │
//! └──────────────────────┴───────────────────────────────────────┘
//! ```

use core::fmt;

// =============================================================================
// EXTENDED KIND
// =============================================================================

/// Consumer-assigned label for allocated memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ExtendedKind(u32);

impl ExtendedKind {
    /// Kernel image (text, data, bss)
    pub const KERNEL_IMAGE: Self = Self(1);
    /// Data handed over by the bootloader
    pub const BOOT_DATA: Self = Self(2);
    /// Page table frames
    pub const PAGE_TABLES: Self = Self(3);
    /// Initial ramdisk
    pub const INITRD: Self = Self(4);
    /// ACPI tables that can be reclaimed once parsed
    pub const ACPI_RECLAIMABLE: Self = Self(5);
    /// Bootloader memory that can be reclaimed after handoff
    pub const BOOTLOADER_RECLAIMABLE: Self = Self(6);
    /// Early kernel stacks
    pub const KERNEL_STACK: Self = Self(7);

    /// First identifier free for consumer-defined labels
    pub const FIRST_CUSTOM: u32 = 0x100;

    /// Create a label from a raw identifier
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw identifier
    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Name of a well-known label
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("kernel image"),
            2 => Some("boot data"),
            3 => Some("page tables"),
            4 => Some("initrd"),
            5 => Some("ACPI reclaimable"),
            6 => Some("bootloader reclaimable"),
            7 => Some("kernel stack"),
            _ => None,
        }
    }
}

impl fmt::Display for ExtendedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "extended #{}", self.0),
        }
    }
}

// =============================================================================
// MEMORY KIND
// =============================================================================

/// Semantic kind of a memory range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// Usable RAM
    FreeRam,
    /// Firmware reserved or otherwise unusable
    Reserved,
    /// Memory-mapped device space
    Peripheral,
    /// Storage for the pool's own nodes
    PoolBookkeeping,
    /// Low memory withheld to trap null dereferences
    NullPointerRegion,
    /// Consumer-assigned label
    Extended(ExtendedKind),
}

impl MemoryKind {
    /// Kernel image label
    pub const KERNEL_IMAGE: Self = Self::Extended(ExtendedKind::KERNEL_IMAGE);
    /// Boot data label
    pub const BOOT_DATA: Self = Self::Extended(ExtendedKind::BOOT_DATA);
    /// Page table label
    pub const PAGE_TABLES: Self = Self::Extended(ExtendedKind::PAGE_TABLES);

    /// Shorthand for `Extended(ExtendedKind::new(id))`
    #[inline]
    pub const fn extended(id: u32) -> Self {
        Self::Extended(ExtendedKind::new(id))
    }

    /// One of the kinds a raw memory map may contain
    #[inline]
    pub const fn is_basic_input(self) -> bool {
        matches!(self, Self::FreeRam | Self::Reserved | Self::Peripheral)
    }

    /// Owned by the pool, never accepted from callers
    #[inline]
    pub const fn is_internal(self) -> bool {
        matches!(self, Self::PoolBookkeeping | Self::NullPointerRegion)
    }

    /// Consumer-assigned label
    #[inline]
    pub const fn is_extended(self) -> bool {
        matches!(self, Self::Extended(_))
    }

    /// Usable RAM
    #[inline]
    pub const fn is_free_ram(self) -> bool {
        matches!(self, Self::FreeRam)
    }

    /// Human readable name
    pub const fn name(self) -> &'static str {
        match self {
            Self::FreeRam => "free RAM",
            Self::Reserved => "reserved",
            Self::Peripheral => "peripheral",
            Self::PoolBookkeeping => "pool bookkeeping",
            Self::NullPointerRegion => "null pointer region",
            Self::Extended(ext) => match ext.name() {
                Some(name) => name,
                None => "extended",
            },
        }
    }

    /// Convert from a Limine memory map entry type
    pub fn from_limine(limine_type: u64) -> Self {
        match limine_type {
            0 => Self::FreeRam,
            2 => Self::Extended(ExtendedKind::ACPI_RECLAIMABLE),
            5 => Self::Extended(ExtendedKind::BOOTLOADER_RECLAIMABLE),
            6 => Self::KERNEL_IMAGE,
            7 => Self::Peripheral, // framebuffer
            _ => Self::Reserved,   // reserved, ACPI NVS, bad memory, unknown
        }
    }

    /// Convert from a Multiboot2 memory map entry type
    pub fn from_multiboot2(mb_type: u32) -> Self {
        match mb_type {
            1 => Self::FreeRam,
            3 => Self::Extended(ExtendedKind::ACPI_RECLAIMABLE),
            _ => Self::Reserved,
        }
    }

    /// Convert from a UEFI memory descriptor type
    pub fn from_uefi(uefi_type: u32) -> Self {
        match uefi_type {
            7 => Self::FreeRam, // EfiConventionalMemory
            1..=4 => Self::Extended(ExtendedKind::BOOTLOADER_RECLAIMABLE), // loader + boot services
            9 => Self::Extended(ExtendedKind::ACPI_RECLAIMABLE),
            11 | 12 => Self::Peripheral, // MMIO, MMIO port space
            _ => Self::Reserved,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extended(ext) => write!(f, "{ext}"),
            other => f.write_str(other.name()),
        }
    }
}

impl From<ExtendedKind> for MemoryKind {
    fn from(ext: ExtendedKind) -> Self {
        Self::Extended(ext)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classes() {
        assert!(MemoryKind::FreeRam.is_basic_input());
        assert!(MemoryKind::Peripheral.is_basic_input());
        assert!(MemoryKind::PoolBookkeeping.is_internal());
        assert!(!MemoryKind::PoolBookkeeping.is_extended());
        assert!(MemoryKind::KERNEL_IMAGE.is_extended());
        assert!(!MemoryKind::KERNEL_IMAGE.is_basic_input());
        assert!(!MemoryKind::NullPointerRegion.is_basic_input());
    }

    #[test]
    fn test_bootloader_type_mapping() {
        assert_eq!(MemoryKind::from_limine(0), MemoryKind::FreeRam);
        assert_eq!(MemoryKind::from_limine(6), MemoryKind::KERNEL_IMAGE);
        assert_eq!(MemoryKind::from_limine(7), MemoryKind::Peripheral);
        assert_eq!(MemoryKind::from_limine(42), MemoryKind::Reserved);
        assert_eq!(MemoryKind::from_multiboot2(1), MemoryKind::FreeRam);
        assert_eq!(MemoryKind::from_multiboot2(4), MemoryKind::Reserved);
        assert_eq!(MemoryKind::from_uefi(7), MemoryKind::FreeRam);
        assert_eq!(MemoryKind::from_uefi(11), MemoryKind::Peripheral);
        assert_eq!(
            MemoryKind::from_uefi(3),
            MemoryKind::Extended(ExtendedKind::BOOTLOADER_RECLAIMABLE)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", MemoryKind::FreeRam), "free RAM");
        assert_eq!(format!("{}", MemoryKind::PAGE_TABLES), "page tables");
        assert_eq!(format!("{}", MemoryKind::extended(0x1234)), "extended #4660");
    }
}
