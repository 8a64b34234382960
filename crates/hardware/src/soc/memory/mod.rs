//! Physical System Memory (DRAM).
//!
//! This module implements the main system memory. It provides:
//! 1. **Buffer:** Backing storage (`DramBuffer`) for RAM contents with dirty-page tracking.
//! 2. **Memory:** Maps the buffer at a physical base address; accesses outside the mapped
//!    range raise access faults.
//! 3. **Controller:** Latency modeling (simple or DRAM row-buffer) for timing simulation.

/// DRAM buffer implementation for raw byte storage.
pub mod buffer;

/// Memory controller implementations for access latency modeling.
pub mod controller;

use self::buffer::DramBuffer;
use crate::common::{AccessType, Trap};

/// System memory mapped at `base_addr`.
#[derive(Debug)]
pub struct Memory {
    buffer: DramBuffer,
    base_addr: u64,
}

impl Memory {
    /// Creates a zeroed memory of `size` bytes mapped at `base_addr`.
    pub fn new(base_addr: u64, size: usize) -> Self {
        Self {
            buffer: DramBuffer::new(size),
            base_addr,
        }
    }

    /// First mapped physical address.
    pub fn base(&self) -> u64 {
        self.base_addr
    }

    /// Mapped size in bytes.
    pub fn size(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// One past the last mapped physical address.
    pub fn end(&self) -> u64 {
        self.base_addr + self.size()
    }

    /// Returns `true` when `[addr, addr + len)` lies entirely inside RAM.
    pub fn contains(&self, addr: u64, len: u64) -> bool {
        self.offset_of(addr, len).is_some()
    }

    fn offset_of(&self, addr: u64, len: u64) -> Option<usize> {
        let offset = addr.checked_sub(self.base_addr)?;
        let end = offset.checked_add(len)?;
        (end <= self.size()).then_some(offset as usize)
    }

    /// Reads a little-endian value of `size` bytes (1, 2, 4, or 8).
    ///
    /// # Arguments
    ///
    /// * `addr` - Physical address.
    /// * `size` - Access width in bytes.
    /// * `access` - Access kind, used to pick the fault raised on an unmapped address.
    pub fn read(&self, addr: u64, size: usize, access: AccessType) -> Result<u64, Trap> {
        let bytes = self
            .read_bytes(addr, size)
            .ok_or_else(|| access.access_fault(addr))?;
        let mut raw = [0u8; 8];
        raw[..size].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Writes the low `size` bytes of `val` little-endian.
    pub fn write(&mut self, addr: u64, size: usize, val: u64) -> Result<(), Trap> {
        let bytes = val.to_le_bytes();
        if self.write_bytes(addr, &bytes[..size.min(8)]) {
            Ok(())
        } else {
            Err(Trap::StoreAccessFault(addr))
        }
    }

    /// Borrows `len` bytes at `addr`, or `None` when the range is not fully mapped.
    pub fn read_bytes(&self, addr: u64, len: usize) -> Option<&[u8]> {
        let offset = self.offset_of(addr, len as u64)?;
        self.buffer.read_slice(offset, len)
    }

    /// Copies `data` to `addr`.
    ///
    /// # Returns
    ///
    /// `false` (and nothing written) when the range is not fully mapped.
    pub fn write_bytes(&mut self, addr: u64, data: &[u8]) -> bool {
        match self.offset_of(addr, data.len() as u64) {
            Some(offset) => self.buffer.write_slice(offset, data),
            None => false,
        }
    }

    /// Fills `[addr, addr + len)` with `byte`.
    pub fn fill(&mut self, addr: u64, len: usize, byte: u8) -> bool {
        self.write_bytes(addr, &vec![byte; len])
    }

    /// Zeroes every page written since the last scrub and returns how many there were.
    pub fn scrub(&mut self) -> usize {
        self.buffer.scrub()
    }

    /// Number of pages written since the last scrub.
    pub fn dirty_pages(&self) -> usize {
        self.buffer.dirty_pages()
    }
}
