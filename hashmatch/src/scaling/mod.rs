//! Shard placement framework
//!
//! Fingerprints are spread over a fixed number of in-memory shards, one per
//! scan worker. Every insert lands in exactly one shard; every query scans
//! all of them.
//!
//! Architecture:
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    ShardRouter                            │
//! │  - Picks the single target shard for each insert         │
//! │  - Delegates the choice to a PlacementStrategy           │
//! ├──────────────────────────────────────────────────────────┤
//! │  PlacementStrategy                                       │
//! │  - Least-loaded (default, stays within one entry)        │
//! │  - Round-robin                                           │
//! │  - Adjacent-pair (legacy walk, first trigger only)       │
//! ├──────────────────────────────────────────────────────────┤
//! │  ShardStore                                              │
//! │  - N append-only shards, fixed at startup                │
//! │  - Per-shard RwLock: scans read, inserts write           │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod placement;
pub mod router;
pub mod shard;

pub use placement::{AdjacentPair, LeastLoaded, PlacementPolicy, PlacementStrategy, RoundRobin};
pub use router::ShardRouter;
pub use shard::{FingerprintEntry, Shard, ShardId, ShardStore};
