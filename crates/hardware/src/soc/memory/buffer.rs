//! DRAM Buffer Implementation.
//!
//! This module provides the backing store for simulated RAM. It provides:
//! 1. **Storage:** A zero-initialised byte buffer sized from the configuration.
//! 2. **Dirty Tracking:** A per-page dirty map recording every 4 KiB page that has been written.
//! 3. **Teardown:** `scrub` zeroes only the dirty pages, so tearing down a process between
//!    trials costs proportional to what the trial touched rather than to the RAM size.

use crate::common::{PAGE_SHIFT, PAGE_SIZE};

/// Byte-addressable RAM contents with page-granular dirty tracking.
#[derive(Debug)]
pub struct DramBuffer {
    bytes: Vec<u8>,
    dirty: Vec<bool>,
}

impl DramBuffer {
    /// Creates a zeroed DRAM buffer of the specified size.
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the buffer in bytes.
    pub fn new(size: usize) -> Self {
        let pages = size.div_ceil(PAGE_SIZE as usize);
        Self {
            bytes: vec![0; size],
            dirty: vec![false; pages],
        }
    }

    /// Returns the size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` when the buffer has zero capacity.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reads `len` bytes at `offset`, or `None` when the range leaves the buffer.
    pub fn read_slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.bytes.get(offset..end)
    }

    /// Writes `data` at `offset` and marks the touched pages dirty.
    ///
    /// # Returns
    ///
    /// `false` (and no bytes written) when the range leaves the buffer.
    pub fn write_slice(&mut self, offset: usize, data: &[u8]) -> bool {
        let Some(end) = offset.checked_add(data.len()) else {
            return false;
        };
        let Some(dest) = self.bytes.get_mut(offset..end) else {
            return false;
        };
        dest.copy_from_slice(data);
        if !data.is_empty() {
            let first = offset >> PAGE_SHIFT;
            let last = (end - 1) >> PAGE_SHIFT;
            for page in &mut self.dirty[first..=last] {
                *page = true;
            }
        }
        true
    }

    /// Number of pages written since the last scrub.
    pub fn dirty_pages(&self) -> usize {
        self.dirty.iter().filter(|d| **d).count()
    }

    /// Zeroes every dirty page and clears the dirty map.
    ///
    /// # Returns
    ///
    /// The number of pages that were zeroed.
    pub fn scrub(&mut self) -> usize {
        let page = PAGE_SIZE as usize;
        let mut scrubbed = 0;
        for (idx, dirty) in self.dirty.iter_mut().enumerate() {
            if *dirty {
                let start = idx * page;
                let end = (start + page).min(self.bytes.len());
                self.bytes[start..end].fill(0);
                *dirty = false;
                scrubbed += 1;
            }
        }
        scrubbed
    }
}
