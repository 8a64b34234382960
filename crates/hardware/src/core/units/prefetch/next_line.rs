//! Next-Line Prefetcher.
//!
//! A stateless spatial prefetcher: every demand miss requests the following `degree` lines.

use super::Prefetcher;

/// Next-Line Prefetcher state.
#[derive(Debug)]
pub struct NextLinePrefetcher {
    /// Size of a cache line in bytes.
    line_bytes: u64,
    /// Number of subsequent lines to prefetch (prefetch degree).
    degree: usize,
}

impl NextLinePrefetcher {
    /// Creates a new Next-Line prefetcher.
    ///
    /// # Arguments
    ///
    /// * `line_bytes` - The size of a cache line in bytes.
    /// * `degree` - The number of lines to prefetch ahead (at least 1).
    pub fn new(line_bytes: usize, degree: usize) -> Self {
        Self {
            line_bytes: line_bytes as u64,
            degree: degree.max(1),
        }
    }
}

impl Prefetcher for NextLinePrefetcher {
    fn observe(&mut self, addr: u64, hit: bool) -> Vec<u64> {
        if hit {
            return Vec::new();
        }
        let base = addr & !(self.line_bytes - 1);
        (1..=self.degree as u64)
            .map(|k| base.wrapping_add(self.line_bytes * k))
            .collect()
    }
}
