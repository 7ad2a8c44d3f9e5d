//! Engine Statistics
//!
//! Lock-free counters for inserts, queries and protocol errors. Hot path
//! updates are a single relaxed atomic add.

use std::sync::atomic::{AtomicU64, Ordering};

/// Aligned counter to avoid false sharing between atomic counters
#[repr(align(64))]
struct AlignedCounter(AtomicU64);

impl AlignedCounter {
    fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    #[inline]
    fn load(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Operation counters for one matcher instance
pub struct EngineStats {
    /// Successful inserts
    inserts: AlignedCounter,
    /// Queries executed
    queries: AlignedCounter,
    /// Matches sent back (after truncation)
    matches_returned: AlignedCounter,
    /// Queries that hit the result cap
    truncated_queries: AlignedCounter,
    /// Lines that parsed as no known command
    invalid_lines: AlignedCounter,
}

impl EngineStats {
    pub fn new() -> Self {
        Self {
            inserts: AlignedCounter::new(),
            queries: AlignedCounter::new(),
            matches_returned: AlignedCounter::new(),
            truncated_queries: AlignedCounter::new(),
            invalid_lines: AlignedCounter::new(),
        }
    }

    #[inline]
    pub fn record_insert(&self) {
        self.inserts.add(1);
    }

    #[inline]
    pub fn record_query(&self, returned: usize, truncated: bool) {
        self.queries.add(1);
        self.matches_returned.add(returned as u64);
        if truncated {
            self.truncated_queries.add(1);
        }
    }

    #[inline]
    pub fn record_invalid_line(&self) {
        self.invalid_lines.add(1);
    }

    /// Copy out the counters; shard sizes are filled in by the caller
    pub fn snapshot(&self, shard_sizes: Vec<usize>) -> StatsSnapshot {
        StatsSnapshot {
            total_entries: shard_sizes.iter().sum(),
            shard_sizes,
            inserts: self.inserts.load(),
            queries: self.queries.load(),
            matches_returned: self.matches_returned.load(),
            truncated_queries: self.truncated_queries.load(),
            invalid_lines: self.invalid_lines.load(),
        }
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of engine statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub shard_sizes: Vec<usize>,
    pub total_entries: usize,
    pub inserts: u64,
    pub queries: u64,
    pub matches_returned: u64,
    pub truncated_queries: u64,
    pub invalid_lines: u64,
}

impl StatsSnapshot {
    pub fn shard_count(&self) -> usize {
        self.shard_sizes.len()
    }
}
