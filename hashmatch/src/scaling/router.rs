//! Shard Router - Routes new fingerprints to their shard
//!
//! The router owns the placement strategy and is the only writer into the
//! shard store. Reads never go through it: a query always scans every shard.

use std::sync::Arc;

use super::placement::PlacementStrategy;
use super::shard::{FingerprintEntry, ShardId, ShardStore};
use crate::Result;

/// Routes inserts to exactly one shard
pub struct ShardRouter {
    store: Arc<ShardStore>,
    strategy: Box<dyn PlacementStrategy>,
}

impl ShardRouter {
    pub fn new(store: Arc<ShardStore>, strategy: Box<dyn PlacementStrategy>) -> Self {
        Self { store, strategy }
    }

    /// Name of the active placement strategy
    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Pick the shard the next insert should land in
    pub fn route_write(&self) -> ShardId {
        let sizes = self.store.sizes();
        self.strategy.place(&sizes)
    }

    /// Store one fingerprint, returning the shard that received it
    pub fn insert(&self, owner_id: u64, hash: u64) -> Result<ShardId> {
        let shard_id = self.route_write();
        self.store.append(shard_id, FingerprintEntry::new(owner_id, hash))?;
        Ok(shard_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
