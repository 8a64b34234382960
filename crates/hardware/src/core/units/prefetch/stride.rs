//! Stride Prefetcher.
//!
//! Detects constant strides in the demand stream. Accesses are grouped by 4 KiB region into
//! a Reference Prediction Table (RPT) holding the last address, the last stride, and a 2-bit
//! confidence counter. Once the same stride has been seen with full confidence, each access
//! requests the next `degree` strides ahead.

use super::Prefetcher;
use crate::common::PAGE_SHIFT;

/// Entry in the Reference Prediction Table.
#[derive(Debug, Default, Clone, Copy)]
struct RptEntry {
    last_addr: u64,
    stride: i64,
    confidence: u8,
}

/// Saturation value of the confidence counter.
const MAX_CONFIDENCE: u8 = 3;

/// Stride Prefetcher state.
#[derive(Debug)]
pub struct StridePrefetcher {
    table: Vec<RptEntry>,
    line_bytes: u64,
    table_mask: usize,
    degree: usize,
}

impl StridePrefetcher {
    /// Creates a new Stride prefetcher.
    ///
    /// # Arguments
    ///
    /// * `line_bytes` - The size of a cache line in bytes.
    /// * `table_size` - Number of RPT entries; rounded up to a power of two.
    /// * `degree` - The number of strides to prefetch ahead (at least 1).
    pub fn new(line_bytes: usize, table_size: usize, degree: usize) -> Self {
        let size = table_size.max(1).next_power_of_two();
        Self {
            table: vec![RptEntry::default(); size],
            line_bytes: line_bytes as u64,
            table_mask: size - 1,
            degree: degree.max(1),
        }
    }
}

impl Prefetcher for StridePrefetcher {
    fn observe(&mut self, addr: u64, _hit: bool) -> Vec<u64> {
        let idx = ((addr >> PAGE_SHIFT) as usize) & self.table_mask;
        let entry = &mut self.table[idx];

        let stride = addr.wrapping_sub(entry.last_addr) as i64;
        let mut prefetches = Vec::new();

        if stride != 0 && stride == entry.stride {
            if entry.confidence < MAX_CONFIDENCE {
                entry.confidence += 1;
            } else {
                for k in 1..=self.degree as i64 {
                    let target = addr.wrapping_add(entry.stride.wrapping_mul(k) as u64);
                    prefetches.push(target & !(self.line_bytes - 1));
                }
            }
        } else if entry.confidence > 0 {
            entry.confidence -= 1;
        } else {
            entry.stride = stride;
        }

        entry.last_addr = addr;
        prefetches
    }

    fn reset(&mut self) {
        self.table.fill(RptEntry::default());
    }
}
