//! Placement Strategy - Chooses the shard that receives a new fingerprint
//!
//! Every strategy returns exactly one shard index per call:
//! - Least-loaded: smallest shard, lowest index on ties
//! - Round-robin: rotating cursor, ignores sizes
//! - Adjacent-pair: first shard that is smaller than its left neighbour

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::shard::ShardId;
use crate::HashMatchError;

// ============================================================================
// Placement Strategy Trait
// ============================================================================

/// Trait for placement strategy implementations
pub trait PlacementStrategy: Send + Sync {
    /// Given the current size of every shard, return the target shard.
    ///
    /// `sizes` is never empty.
    fn place(&self, sizes: &[usize]) -> ShardId;

    /// Name of this strategy (for logging)
    fn name(&self) -> &str;
}

// ============================================================================
// Least Loaded
// ============================================================================

/// Always append to the smallest shard.
///
/// Shard sizes never differ by more than one entry when this is the only
/// writer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastLoaded;

impl PlacementStrategy for LeastLoaded {
    fn place(&self, sizes: &[usize]) -> ShardId {
        let mut best = 0;
        for (i, &len) in sizes.iter().enumerate().skip(1) {
            if len < sizes[best] {
                best = i;
            }
        }
        best
    }

    fn name(&self) -> &str {
        "least-loaded"
    }
}

// ============================================================================
// Round Robin
// ============================================================================

/// Rotate through the shards in index order
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlacementStrategy for RoundRobin {
    fn place(&self, sizes: &[usize]) -> ShardId {
        self.cursor.fetch_add(1, Ordering::Relaxed) % sizes.len()
    }

    fn name(&self) -> &str {
        "round-robin"
    }
}

// ============================================================================
// Adjacent Pair
// ============================================================================

/// Walk adjacent pairs (i, i+1) and pick i+1 as soon as it holds fewer
/// entries than i. Falls back to shard 0 when no pair qualifies.
///
/// Only the first qualifying pair is used, so a single insert never touches
/// more than one shard.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdjacentPair;

impl PlacementStrategy for AdjacentPair {
    fn place(&self, sizes: &[usize]) -> ShardId {
        sizes
            .windows(2)
            .position(|pair| pair[1] < pair[0])
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn name(&self) -> &str {
        "adjacent"
    }
}

// ============================================================================
// Policy selector
// ============================================================================

/// Configuration-level choice of placement strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "server", derive(clap::ValueEnum))]
pub enum PlacementPolicy {
    #[default]
    LeastLoaded,
    RoundRobin,
    Adjacent,
}

impl PlacementPolicy {
    /// Instantiate the strategy for this policy
    pub fn build(self) -> Box<dyn PlacementStrategy> {
        match self {
            PlacementPolicy::LeastLoaded => Box::new(LeastLoaded),
            PlacementPolicy::RoundRobin => Box::new(RoundRobin::new()),
            PlacementPolicy::Adjacent => Box::new(AdjacentPair),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementPolicy::LeastLoaded => "least-loaded",
            PlacementPolicy::RoundRobin => "round-robin",
            PlacementPolicy::Adjacent => "adjacent",
        }
    }
}

impl fmt::Display for PlacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementPolicy {
    type Err = HashMatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "least-loaded" | "least_loaded" => Ok(PlacementPolicy::LeastLoaded),
            "round-robin" | "round_robin" => Ok(PlacementPolicy::RoundRobin),
            "adjacent" => Ok(PlacementPolicy::Adjacent),
            other => Err(HashMatchError::InvalidConfig(format!(
                "unknown placement policy '{}'",
                other
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `inserts` placements through a strategy, tracking sizes locally
    fn simulate(strategy: &dyn PlacementStrategy, shards: usize, inserts: usize) -> Vec<usize> {
        let mut sizes = vec![0usize; shards];
        for _ in 0..inserts {
            let target = strategy.place(&sizes);
            sizes[target] += 1;
        }
        sizes
    }

    #[test]
    fn test_least_loaded_one_per_shard() {
        assert_eq!(simulate(&LeastLoaded, 4, 4), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_least_loaded_balanced() {
        let sizes = simulate(&LeastLoaded, 7, 1000);
        let min = *sizes.iter().min().unwrap();
        let max = *sizes.iter().max().unwrap();
        assert!(max - min <= 1, "Unbalanced distribution: {:?}", sizes);
        assert_eq!(sizes.iter().sum::<usize>(), 1000);
    }

    #[test]
    fn test_least_loaded_prefers_lowest_index() {
        assert_eq!(LeastLoaded.place(&[3, 1, 1, 2]), 1);
        assert_eq!(LeastLoaded.place(&[0, 0, 0]), 0);
    }

    #[test]
    fn test_round_robin_cycles() {
        let rr = RoundRobin::new();
        let picks: Vec<_> = (0..6).map(|_| rr.place(&[0, 0, 0])).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(simulate(&RoundRobin::new(), 4, 4), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_adjacent_pair_first_trigger_only() {
        // Both (0,1) and (2,3) qualify; only shard 1 may receive the entry
        assert_eq!(AdjacentPair.place(&[5, 4, 6, 2]), 1);
        // No pair qualifies
        assert_eq!(AdjacentPair.place(&[1, 1, 1]), 0);
        assert_eq!(AdjacentPair.place(&[0, 2, 3]), 0);
    }

    #[test]
    fn test_adjacent_pair_single_insert_per_call() {
        let sizes = simulate(&AdjacentPair, 4, 4);
        assert_eq!(sizes, vec![1, 1, 1, 1]);
        let sizes = simulate(&AdjacentPair, 5, 503);
        assert_eq!(sizes.iter().sum::<usize>(), 503);
    }

    #[test]
    fn test_single_shard() {
        assert_eq!(LeastLoaded.place(&[9]), 0);
        assert_eq!(RoundRobin::new().place(&[9]), 0);
        assert_eq!(AdjacentPair.place(&[9]), 0);
    }

    #[test]
    fn test_policy_from_str() {
        let parse = |s: &str| s.parse::<PlacementPolicy>().unwrap();
        assert_eq!(parse("least-loaded"), PlacementPolicy::LeastLoaded);
        assert_eq!(parse("Round_Robin"), PlacementPolicy::RoundRobin);
        assert_eq!(parse("adjacent"), PlacementPolicy::Adjacent);
        assert!("random".parse::<PlacementPolicy>().is_err());
        assert_eq!(PlacementPolicy::RoundRobin.build().name(), "round-robin");
    }
}
