//! Query Coordinator - fan-out/fan-in over all shards
//!
//! Owns a rayon pool sized to the shard count, built once at startup. Each
//! query submits exactly one scan task per shard and blocks until every task
//! has finished; there is no early return, timeout or cancellation.
//!
//! The result cap is one budget shared by all scan tasks, so a query never
//! buffers more than `max_results` matches in total, whatever the shard
//! count.

use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::scan::{scan_shard, ResultBudget, ShardScan};
use super::{QueryOutcome, QueryParams};
use crate::scaling::ShardStore;
use crate::{HashMatchError, Result};

pub struct QueryCoordinator {
    store: Arc<ShardStore>,
    pool: ThreadPool,
    /// 0 means unlimited
    max_results: usize,
}

impl QueryCoordinator {
    /// Start `workers` scan threads over `store`
    pub fn new(store: Arc<ShardStore>, workers: usize, max_results: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("hashmatch-scan-{}", i))
            .build()
            .map_err(|e| HashMatchError::ThreadPool(e.to_string()))?;

        Ok(Self {
            store,
            pool,
            max_results,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run one query across every shard
    pub fn search(&self, params: QueryParams) -> QueryOutcome {
        let (limit, budget) = match self.max_results {
            0 => (usize::MAX, ResultBudget::unlimited()),
            n => (n, ResultBudget::new(n)),
        };

        let scans: Vec<ShardScan> = self.pool.install(|| {
            self.store
                .shards()
                .par_iter()
                .with_max_len(1)
                .map(|shard| scan_shard(shard, params, &budget))
                .collect()
        });

        merge_scans(scans, limit)
    }
}

/// Concatenate per-shard buffers and apply the global cap
fn merge_scans(scans: Vec<ShardScan>, limit: usize) -> QueryOutcome {
    let total_matches: u64 = scans.iter().map(|s| s.total).sum();
    let kept: usize = scans.iter().map(|s| s.matches.len()).sum();

    let mut matches = Vec::with_capacity(kept.min(limit));
    for scan in scans {
        let room = limit - matches.len();
        if room == 0 {
            break;
        }
        matches.extend(scan.matches.into_iter().take(room));
    }

    QueryOutcome {
        matches,
        total_matches,
        truncated: total_matches > limit as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Match;
    use crate::scaling::FingerprintEntry;

    fn coordinator(shards: usize, max_results: usize) -> (Arc<ShardStore>, QueryCoordinator) {
        let store = Arc::new(ShardStore::new(shards).unwrap());
        let coord = QueryCoordinator::new(Arc::clone(&store), shards, max_results).unwrap();
        (store, coord)
    }

    #[test]
    fn test_pool_matches_shard_count() {
        let (_, coord) = coordinator(3, 0);
        assert_eq!(coord.worker_count(), 3);
    }

    #[test]
    fn test_search_spans_all_shards() {
        let (store, coord) = coordinator(4, 0);
        for owner in 0..40u64 {
            store
                .append((owner % 4) as usize, FingerprintEntry::new(owner, owner))
                .unwrap();
        }

        let outcome = coord.search(QueryParams::new(0, 64));
        assert_eq!(outcome.len(), 40);
        assert!(!outcome.truncated);

        let mut owners: Vec<u64> = outcome.matches.iter().map(|m| m.owner_id).collect();
        owners.sort_unstable();
        assert_eq!(owners, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_exact_match_always_found() {
        let (store, coord) = coordinator(2, 0);
        store.append(1, FingerprintEntry::new(99, 0x1234_5678_9ABC_DEF0)).unwrap();
        store.append(0, FingerprintEntry::new(5, 0)).unwrap();

        let outcome = coord.search(QueryParams::new(0x1234_5678_9ABC_DEF0, 0));
        assert_eq!(outcome.matches, vec![Match { owner_id: 99, distance: 0 }]);
    }

    #[test]
    fn test_no_state_between_queries() {
        let (store, coord) = coordinator(2, 0);
        store.append(0, FingerprintEntry::new(1, 0)).unwrap();
        assert_eq!(coord.search(QueryParams::new(0, 0)).len(), 1);
        assert!(coord.search(QueryParams::new(u64::MAX, 0)).is_empty());
    }

    #[test]
    fn test_result_cap_truncates() {
        let (store, coord) = coordinator(3, 5);
        for owner in 0..12u64 {
            store
                .append((owner % 3) as usize, FingerprintEntry::new(owner, 0))
                .unwrap();
        }

        let outcome = coord.search(QueryParams::new(0, 0));
        assert_eq!(outcome.len(), 5);
        assert_eq!(outcome.total_matches, 12);
        assert!(outcome.truncated);
    }

    #[test]
    fn test_cap_bounds_buffered_matches_across_shards() {
        let (store, _) = coordinator(8, 0);
        for owner in 0..80u64 {
            store
                .append((owner % 8) as usize, FingerprintEntry::new(owner, 0))
                .unwrap();
        }

        let budget = ResultBudget::new(5);
        let scans: Vec<ShardScan> = store
            .shards()
            .iter()
            .map(|shard| scan_shard(shard, QueryParams::new(0, 0), &budget))
            .collect();
        let buffered: usize = scans.iter().map(|s| s.matches.len()).sum();
        let total: u64 = scans.iter().map(|s| s.total).sum();
        assert_eq!(buffered, 5);
        assert_eq!(total, 80);
    }

    #[test]
    fn test_result_cap_exact_fit_not_truncated() {
        let (store, coord) = coordinator(2, 4);
        for owner in 0..4u64 {
            store
                .append((owner % 2) as usize, FingerprintEntry::new(owner, 0))
                .unwrap();
        }
        let outcome = coord.search(QueryParams::new(0, 0));
        assert_eq!(outcome.len(), 4);
        assert!(!outcome.truncated);
    }

    #[test]
    fn test_merge_scans() {
        let scans = vec![
            ShardScan {
                matches: vec![Match { owner_id: 1, distance: 0 }],
                total: 1,
            },
            ShardScan::default(),
            ShardScan {
                matches: vec![
                    Match { owner_id: 2, distance: 3 },
                    Match { owner_id: 3, distance: 4 },
                ],
                total: 2,
            },
        ];
        let outcome = merge_scans(scans, usize::MAX);
        assert_eq!(outcome.total_matches, 3);
        assert_eq!(outcome.len(), 3);
        assert!(!outcome.truncated);
    }
}
