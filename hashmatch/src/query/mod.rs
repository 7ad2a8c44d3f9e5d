//! Query layer: Hamming-distance scan and fan-out/fan-in coordination
//!
//! A query is a (hash, max distance) pair. The coordinator submits one scan
//! task per shard to the worker pool, waits for all of them, and merges the
//! per-task buffers into a single outcome.

pub mod coordinator;
pub mod scan;

pub use coordinator::QueryCoordinator;
pub use scan::{hamming_distance, scan_entries, scan_shard, ResultBudget, ShardScan};

/// Largest possible distance between two 64-bit fingerprints
pub const MAX_DISTANCE: u8 = 64;

/// Validated query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryParams {
    pub hash: u64,
    pub max_distance: u8,
}

impl QueryParams {
    pub fn new(hash: u64, max_distance: u8) -> Self {
        Self { hash, max_distance }
    }
}

/// A stored fingerprint within range of the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Match {
    pub owner_id: u64,
    /// Always in 0..=64
    pub distance: u8,
}

/// Result of a single query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Matches in merge order (shard order, then insertion order); callers
    /// must not rely on it
    pub matches: Vec<Match>,
    /// Every match found, including those dropped by the result cap
    pub total_matches: u64,
    /// True when `matches` was cut short by the result cap
    pub truncated: bool,
}

impl QueryOutcome {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
