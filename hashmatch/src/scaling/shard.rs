//! Shard Store - Fixed set of append-only fingerprint shards
//!
//! Each shard is an independent vector of entries owned by one scan worker.
//! The shard count is chosen at startup and never changes; entries are only
//! ever appended.

use parking_lot::{RwLock, RwLockReadGuard};

use crate::{HashMatchError, Result};

// ============================================================================
// Shard ID
// ============================================================================

/// Index of a shard inside the store (0..shard_count)
pub type ShardId = usize;

// ============================================================================
// Fingerprint Entry
// ============================================================================

/// One stored fingerprint and the owner it was registered for.
///
/// Kept at 16 bytes: a store holds tens of millions of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FingerprintEntry {
    pub owner_id: u64,
    pub hash: u64,
}

impl FingerprintEntry {
    pub fn new(owner_id: u64, hash: u64) -> Self {
        Self { owner_id, hash }
    }
}

// ============================================================================
// Shard
// ============================================================================

/// A single append-only partition of the store.
///
/// Scanners hold the read lock for a whole pass over the shard; inserts take
/// the write lock only long enough to push one entry.
pub struct Shard {
    id: ShardId,
    entries: RwLock<Vec<FingerprintEntry>>,
}

impl Shard {
    fn new(id: ShardId) -> Self {
        Self {
            id,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> ShardId {
        self.id
    }

    /// Number of entries currently stored
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read access to the entries for a scan
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<FingerprintEntry>> {
        self.entries.read()
    }

    fn push(&self, entry: FingerprintEntry) {
        self.entries.write().push(entry);
    }
}

// ============================================================================
// Shard Store
// ============================================================================

/// All shards of a matcher instance
pub struct ShardStore {
    shards: Vec<Shard>,
}

impl ShardStore {
    /// Create a store with `shard_count` empty shards
    pub fn new(shard_count: usize) -> Result<Self> {
        if shard_count == 0 {
            return Err(HashMatchError::InvalidConfig(
                "shard count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            shards: (0..shard_count).map(Shard::new).collect(),
        })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn shard(&self, id: ShardId) -> Option<&Shard> {
        self.shards.get(id)
    }

    /// Current size of every shard, indexed by shard id
    pub fn sizes(&self) -> Vec<usize> {
        self.shards.iter().map(Shard::len).collect()
    }

    /// Total entries across all shards
    pub fn total_entries(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    /// Append one entry to the given shard
    pub fn append(&self, shard_id: ShardId, entry: FingerprintEntry) -> Result<()> {
        let shard = self.shards.get(shard_id).ok_or_else(|| {
            HashMatchError::InvalidConfig(format!(
                "shard {} out of range (store has {})",
                shard_id,
                self.shards.len()
            ))
        })?;
        shard.push(entry);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
