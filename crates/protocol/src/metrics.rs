use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Per-stage timings of one context request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfMetrics {
    pub scan_ms: u64,
    pub dependency_ms: u64,
    pub symbol_ms: u64,
    pub selection_ms: u64,
    pub assembly_ms: u64,
    /// Files returned by the scan.
    pub candidate_count: usize,
    /// Files that made it into the assembled text.
    pub processed_count: usize,
}

impl PerfMetrics {
    pub fn total_ms(&self) -> u64 {
        self.scan_ms + self.dependency_ms + self.symbol_ms + self.selection_ms + self.assembly_ms
    }
}

/// Milliseconds since `started`, saturating.
pub fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
