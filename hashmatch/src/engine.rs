//! Matcher engine context
//!
//! `HashMatcher` owns everything a running service needs: the shard store,
//! the insert router, the query coordinator with its worker pool, and the
//! statistics counters. It is created once and shared by reference.

use std::sync::Arc;

use crate::query::{QueryCoordinator, QueryOutcome, QueryParams};
use crate::scaling::{PlacementPolicy, ShardId, ShardRouter, ShardStore};
use crate::stats::{EngineStats, StatsSnapshot};
use crate::{HashMatchError, Result};

/// Default cap on matches returned by one query
pub const DEFAULT_MAX_RESULTS: usize = 1_000_000;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of shards and scan threads
    pub workers: usize,
    /// How inserts are spread over shards
    pub placement: PlacementPolicy,
    /// Per-query result cap (0 = unlimited)
    pub max_results: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            placement: PlacementPolicy::default(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl EngineConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(HashMatchError::InvalidConfig(
                "worker count must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sharded in-memory fingerprint matcher
pub struct HashMatcher {
    config: EngineConfig,
    store: Arc<ShardStore>,
    router: ShardRouter,
    coordinator: QueryCoordinator,
    stats: EngineStats,
}

impl HashMatcher {
    /// Build the store and start the scan workers
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(ShardStore::new(config.workers)?);
        let router = ShardRouter::new(Arc::clone(&store), config.placement.build());
        let coordinator =
            QueryCoordinator::new(Arc::clone(&store), config.workers, config.max_results)?;

        log::info!(
            "Matcher ready: {} shards, placement {}, max results {}",
            config.workers,
            router.strategy_name(),
            config.max_results
        );

        Ok(Self {
            config,
            store,
            router,
            coordinator,
            stats: EngineStats::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Store one fingerprint for `owner_id`
    pub fn add(&self, owner_id: u64, hash: u64) -> Result<ShardId> {
        let shard_id = self.router.insert(owner_id, hash)?;
        self.stats.record_insert();
        log::trace!("Stored {} 0x{:X} in shard {}", owner_id, hash, shard_id);
        Ok(shard_id)
    }

    /// Find every stored fingerprint within `params.max_distance` bits
    pub fn search(&self, params: QueryParams) -> QueryOutcome {
        let outcome = self.coordinator.search(params);
        self.stats.record_query(outcome.len(), outcome.truncated);
        if outcome.truncated {
            log::warn!(
                "Query {:x} truncated: {} of {} matches returned",
                params.hash,
                outcome.len(),
                outcome.total_matches
            );
        }
        outcome
    }

    pub fn record_invalid_line(&self) {
        self.stats.record_invalid_line();
    }

    pub fn shard_count(&self) -> usize {
        self.store.shard_count()
    }

    pub fn shard_sizes(&self) -> Vec<usize> {
        self.store.sizes()
    }

    pub fn total_entries(&self) -> usize {
        self.store.total_entries()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.store.sizes())
    }
}
