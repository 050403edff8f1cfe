//! # Memory Interface
//!
//! The core never owns a memory map: every access goes through [`Memory`],
//! and a failed access comes back as a [`MemoryFault`] that the CPU turns into
//! a prefetch abort (instruction fetch) or a data abort (anything else).
//!
//! Accesses are little-endian. The CPU aligns halfword and word addresses
//! before calling in, so implementations can rely on `address` being a
//! multiple of the access width.
//!
//! Two implementations are provided:
//!
//! - [`FlatMemory`]: a single zero-based byte array.
//! - [`SegmentedMemory`]: named regions placed at arbitrary base addresses,
//!   optionally read-only. Anything outside a region faults.

use serde::{Deserialize, Serialize};

/// Width of a bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusWidth {
    Byte,
    HalfWord,
    Word,
}

impl BusWidth {
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::HalfWord => 2,
            Self::Word => 4,
        }
    }
}

impl std::fmt::Display for BusWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Byte => f.write_str("byte"),
            Self::HalfWord => f.write_str("halfword"),
            Self::Word => f.write_str("word"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Write,
}

/// A rejected bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryFault {
    pub address: u32,
    pub width: BusWidth,
    pub access: AccessKind,
}

impl MemoryFault {
    #[must_use]
    pub const fn new(address: u32, width: BusWidth, access: AccessKind) -> Self {
        Self {
            address,
            width,
            access,
        }
    }
}

impl std::fmt::Display for MemoryFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let access = match self.access {
            AccessKind::Read => "read",
            AccessKind::Write => "write",
        };
        write!(f, "{} {access} at 0x{:08X} faulted", self.width, self.address)
    }
}

impl std::error::Error for MemoryFault {}

/// A byte-addressable bus as seen by the CPU.
///
/// Only the byte accessors are required. The wider ones are provided in terms
/// of them and report faults with their own width; implementations backed by
/// contiguous storage usually override them. The provided writes stop at the
/// first faulting byte, so a bus that can fault in the middle of a word should
/// override them to keep an aborted store from landing half done.
pub trait Memory {
    fn read_byte(&mut self, address: u32) -> Result<u8, MemoryFault>;

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), MemoryFault>;

    fn read_half_word(&mut self, address: u32) -> Result<u16, MemoryFault> {
        let fault = |_| MemoryFault::new(address, BusWidth::HalfWord, AccessKind::Read);
        let low = self.read_byte(address).map_err(fault)?;
        let high = self.read_byte(address.wrapping_add(1)).map_err(fault)?;

        Ok(u16::from_le_bytes([low, high]))
    }

    fn read_word(&mut self, address: u32) -> Result<u32, MemoryFault> {
        let fault = |_| MemoryFault::new(address, BusWidth::Word, AccessKind::Read);
        let mut bytes = [0; 4];
        for (offset, byte) in (0..).zip(bytes.iter_mut()) {
            *byte = self.read_byte(address.wrapping_add(offset)).map_err(fault)?;
        }

        Ok(u32::from_le_bytes(bytes))
    }

    fn write_half_word(&mut self, address: u32, value: u16) -> Result<(), MemoryFault> {
        let fault = |_| MemoryFault::new(address, BusWidth::HalfWord, AccessKind::Write);
        for (offset, byte) in (0..).zip(value.to_le_bytes()) {
            self.write_byte(address.wrapping_add(offset), byte)
                .map_err(fault)?;
        }

        Ok(())
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<(), MemoryFault> {
        let fault = |_| MemoryFault::new(address, BusWidth::Word, AccessKind::Write);
        for (offset, byte) in (0..).zip(value.to_le_bytes()) {
            self.write_byte(address.wrapping_add(offset), byte)
                .map_err(fault)?;
        }

        Ok(())
    }
}

impl<M: Memory + ?Sized> Memory for Box<M> {
    fn read_byte(&mut self, address: u32) -> Result<u8, MemoryFault> {
        (**self).read_byte(address)
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), MemoryFault> {
        (**self).write_byte(address, value)
    }

    fn read_half_word(&mut self, address: u32) -> Result<u16, MemoryFault> {
        (**self).read_half_word(address)
    }

    fn read_word(&mut self, address: u32) -> Result<u32, MemoryFault> {
        (**self).read_word(address)
    }

    fn write_half_word(&mut self, address: u32, value: u16) -> Result<(), MemoryFault> {
        (**self).write_half_word(address, value)
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<(), MemoryFault> {
        (**self).write_word(address, value)
    }
}

/// Contiguous storage starting at address 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatMemory {
    data: Vec<u8>,
}

impl FlatMemory {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copies `bytes` at `address`, without going through the bus.
    ///
    /// # Errors
    ///
    /// When the image does not fit.
    pub fn load(&mut self, address: u32, bytes: &[u8]) -> Result<(), MemoryFault> {
        let range = self
            .range(address, bytes.len())
            .ok_or_else(|| MemoryFault::new(address, BusWidth::Byte, AccessKind::Write))?;
        self.data[range].copy_from_slice(bytes);

        Ok(())
    }

    fn range(&self, address: u32, len: usize) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(address).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.data.len()).then_some(start..end)
    }

    fn slice<const N: usize>(&self, address: u32, width: BusWidth) -> Result<[u8; N], MemoryFault> {
        self.range(address, N)
            .and_then(|range| self.data[range].try_into().ok())
            .ok_or_else(|| MemoryFault::new(address, width, AccessKind::Read))
    }

    fn slice_mut(
        &mut self,
        address: u32,
        width: BusWidth,
    ) -> Result<&mut [u8], MemoryFault> {
        let range = self
            .range(address, width.bytes() as usize)
            .ok_or_else(|| MemoryFault::new(address, width, AccessKind::Write))?;

        Ok(&mut self.data[range])
    }
}

impl Memory for FlatMemory {
    fn read_byte(&mut self, address: u32) -> Result<u8, MemoryFault> {
        self.slice::<1>(address, BusWidth::Byte).map(|[b]| b)
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), MemoryFault> {
        self.slice_mut(address, BusWidth::Byte)?[0] = value;

        Ok(())
    }

    fn read_half_word(&mut self, address: u32) -> Result<u16, MemoryFault> {
        self.slice(address, BusWidth::HalfWord)
            .map(u16::from_le_bytes)
    }

    fn read_word(&mut self, address: u32) -> Result<u32, MemoryFault> {
        self.slice(address, BusWidth::Word).map(u32::from_le_bytes)
    }

    fn write_half_word(&mut self, address: u32, value: u16) -> Result<(), MemoryFault> {
        self.slice_mut(address, BusWidth::HalfWord)?
            .copy_from_slice(&value.to_le_bytes());

        Ok(())
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<(), MemoryFault> {
        self.slice_mut(address, BusWidth::Word)?
            .copy_from_slice(&value.to_le_bytes());

        Ok(())
    }
}

/// A named window of the address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub base: u32,
    pub read_only: bool,
    data: Vec<u8>,
}

impl Region {
    /// Highest address in the region.
    #[must_use]
    pub fn end(&self) -> u32 {
        // Regions are never empty, checked on insertion.
        self.base + (self.data.len() as u32 - 1)
    }

    #[must_use]
    pub fn contains(&self, address: u32) -> bool {
        address >= self.base && address <= self.end()
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.base <= other.end() && other.base <= self.end()
    }
}

/// Address space made of disjoint regions, everything in between faults.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SegmentedMemory {
    regions: Vec<Region>,
}

impl SegmentedMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `size` zeroed bytes at `base`.
    ///
    /// # Errors
    ///
    /// When the region is empty, wraps past the end of the address space or
    /// overlaps one already mapped.
    pub fn add_region(
        &mut self,
        name: &str,
        base: u32,
        size: u32,
        read_only: bool,
    ) -> Result<&mut Self, String> {
        if size == 0 {
            return Err(format!("Region {name} is empty"));
        }
        if base.checked_add(size - 1).is_none() {
            return Err(format!(
                "Region {name} at 0x{base:08X} with size 0x{size:X} exceeds the address space"
            ));
        }

        let region = Region {
            name: name.to_owned(),
            base,
            read_only,
            data: vec![0; size as usize],
        };
        if let Some(other) = self.regions.iter().find(|r| r.overlaps(&region)) {
            return Err(format!("Region {name} overlaps region {}", other.name));
        }

        tracing::debug!(
            "mapped region {name} at 0x{base:08X}..=0x{:08X}{}",
            region.end(),
            if read_only { " (read only)" } else { "" }
        );
        self.regions.push(region);

        Ok(self)
    }

    #[must_use]
    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Copies `bytes` at `address`, ignoring the read-only attribute.
    ///
    /// # Errors
    ///
    /// When any byte of the image falls outside a mapped region.
    pub fn load(&mut self, address: u32, bytes: &[u8]) -> Result<(), MemoryFault> {
        for (offset, byte) in (0u32..).zip(bytes) {
            let address = address.wrapping_add(offset);
            let slot = self
                .locate(address)
                .ok_or_else(|| MemoryFault::new(address, BusWidth::Byte, AccessKind::Write))?;
            *slot.0 = *byte;
        }

        Ok(())
    }

    fn is_writable(&self, address: u32) -> bool {
        self.regions
            .iter()
            .any(|r| !r.read_only && r.contains(address))
    }

    /// Stores `bytes` only when every one of them lands in a writable region,
    /// a store straddling a region boundary never lands half done.
    fn write_bytes(
        &mut self,
        address: u32,
        bytes: &[u8],
        width: BusWidth,
    ) -> Result<(), MemoryFault> {
        let addresses = (0u32..)
            .zip(bytes)
            .map(|(offset, byte)| (address.wrapping_add(offset), *byte));
        if !addresses.clone().all(|(a, _)| self.is_writable(a)) {
            return Err(MemoryFault::new(address, width, AccessKind::Write));
        }

        for (address, byte) in addresses {
            if let Some((slot, _)) = self.locate(address) {
                *slot = byte;
            }
        }

        Ok(())
    }

    fn locate(&mut self, address: u32) -> Option<(&mut u8, bool)> {
        self.regions
            .iter_mut()
            .find(|r| r.contains(address))
            .map(|r| (&mut r.data[(address - r.base) as usize], r.read_only))
    }
}

impl Memory for SegmentedMemory {
    fn read_byte(&mut self, address: u32) -> Result<u8, MemoryFault> {
        self.locate(address)
            .map(|(byte, _)| *byte)
            .ok_or_else(|| MemoryFault::new(address, BusWidth::Byte, AccessKind::Read))
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), MemoryFault> {
        match self.locate(address) {
            Some((byte, false)) => {
                *byte = value;
                Ok(())
            }
            _ => Err(MemoryFault::new(address, BusWidth::Byte, AccessKind::Write)),
        }
    }

    fn write_half_word(&mut self, address: u32, value: u16) -> Result<(), MemoryFault> {
        self.write_bytes(address, &value.to_le_bytes(), BusWidth::HalfWord)
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<(), MemoryFault> {
        self.write_bytes(address, &value.to_le_bytes(), BusWidth::Word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flat_memory_is_little_endian() {
        let mut memory = FlatMemory::new(16);
        memory.write_word(4, 0x1122_3344).unwrap();

        assert_eq!(memory.read_byte(4), Ok(0x44));
        assert_eq!(memory.read_byte(7), Ok(0x11));
        assert_eq!(memory.read_half_word(6), Ok(0x1122));
        assert_eq!(memory.read_word(4), Ok(0x1122_3344));
    }

    #[test]
    fn flat_memory_faults_past_the_end() {
        let mut memory = FlatMemory::new(8);

        assert_eq!(
            memory.read_word(6),
            Err(MemoryFault::new(6, BusWidth::Word, AccessKind::Read))
        );
        assert_eq!(
            memory.write_half_word(8, 1),
            Err(MemoryFault::new(8, BusWidth::HalfWord, AccessKind::Write))
        );
        assert_eq!(
            memory.read_byte(u32::MAX),
            Err(MemoryFault::new(u32::MAX, BusWidth::Byte, AccessKind::Read))
        );
        assert!(memory.load(4, &[0; 5]).is_err());
    }

    #[test]
    fn segmented_memory_maps_disjoint_regions() {
        let mut memory = SegmentedMemory::new();
        memory
            .add_region("rom", 0x0000_0000, 0x100, true)
            .unwrap()
            .add_region("ram", 0x0200_0000, 0x100, false)
            .unwrap();

        memory.load(0, &[0x78, 0x56, 0x34, 0x12]).unwrap();
        assert_eq!(memory.read_word(0), Ok(0x1234_5678));

        memory.write_word(0x0200_0010, 0xCAFE_BABE).unwrap();
        assert_eq!(memory.read_half_word(0x0200_0012), Ok(0xCAFE));

        assert_eq!(
            memory.write_word(0x10, 1),
            Err(MemoryFault::new(0x10, BusWidth::Word, AccessKind::Write))
        );
        assert_eq!(
            memory.read_word(0x0100_0000),
            Err(MemoryFault::new(0x0100_0000, BusWidth::Word, AccessKind::Read))
        );
        assert_eq!(memory.region("ram").map(Region::end), Some(0x0200_00FF));
    }

    #[test]
    fn store_across_a_read_only_boundary_writes_nothing() {
        let mut memory = SegmentedMemory::new();
        memory
            .add_region("ram", 0x000, 0x202, false)
            .unwrap()
            .add_region("rom", 0x202, 0x100, true)
            .unwrap();

        assert_eq!(
            memory.write_word(0x200, 0xAABB_CCDD),
            Err(MemoryFault::new(0x200, BusWidth::Word, AccessKind::Write))
        );
        assert_eq!(
            memory.write_half_word(0x201, 0xCCDD),
            Err(MemoryFault::new(0x201, BusWidth::HalfWord, AccessKind::Write))
        );
        assert_eq!(memory.read_half_word(0x200), Ok(0));

        memory.write_half_word(0x200, 0xCCDD).unwrap();
        assert_eq!(memory.read_half_word(0x200), Ok(0xCCDD));
    }

    #[test]
    fn overlapping_regions_are_rejected() {
        let mut memory = SegmentedMemory::new();
        memory.add_region("a", 0x1000, 0x100, false).unwrap();

        assert!(memory.add_region("b", 0x10FF, 0x10, false).is_err());
        assert!(memory.add_region("c", 0x0F00, 0x101, false).is_err());
        assert!(memory.add_region("d", 0xFFFF_FFF0, 0x20, false).is_err());
        assert!(memory.add_region("e", 0x2000, 0, false).is_err());
        assert!(memory.add_region("f", 0x1100, 0x10, false).is_ok());
    }

    #[test]
    fn fault_message_names_the_access() {
        let fault = MemoryFault::new(0x0400_0000, BusWidth::HalfWord, AccessKind::Write);
        assert_eq!(fault.to_string(), "halfword write at 0x04000000 faulted");
    }
}
