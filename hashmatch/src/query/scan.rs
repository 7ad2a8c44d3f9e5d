//! Distance Scanner - per-shard Hamming distance pass
//!
//! Hot loop of the whole service: one XOR, one popcount and one compare per
//! stored entry. Each scan fills its own buffer; concurrent scans share only
//! the result budget, touched once per kept match.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Match, QueryParams};
use crate::scaling::{FingerprintEntry, Shard};

/// Number of differing bits between two fingerprints
#[inline(always)]
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Shared cap on matches kept across all scans of one query.
///
/// Slots are claimed one per kept match, so the combined buffers of every
/// shard never hold more than the cap.
#[derive(Debug)]
pub struct ResultBudget {
    remaining: AtomicUsize,
    limited: bool,
}

impl ResultBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(limit),
            limited: true,
        }
    }

    /// Budget that never runs out and never touches the counter
    pub fn unlimited() -> Self {
        Self {
            remaining: AtomicUsize::new(usize::MAX),
            limited: false,
        }
    }

    /// Claim one slot; false once the budget is spent
    #[inline]
    pub fn try_take(&self) -> bool {
        if !self.limited {
            return true;
        }
        if self.remaining.load(Ordering::Relaxed) == 0 {
            return false;
        }
        self.remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Matches collected from one shard
#[derive(Debug, Default)]
pub struct ShardScan {
    /// Matches that got a slot from the budget
    pub matches: Vec<Match>,
    /// All matches seen, kept or not
    pub total: u64,
}

/// Scan a slice of entries, keeping matches while the budget lasts
pub fn scan_entries(
    entries: &[FingerprintEntry],
    params: QueryParams,
    budget: &ResultBudget,
) -> ShardScan {
    let query = params.hash;
    let max_distance = params.max_distance as u32;
    let mut matches = Vec::new();
    let mut total = 0u64;

    for entry in entries {
        let distance = hamming_distance(query, entry.hash);
        if distance <= max_distance {
            total += 1;
            if budget.try_take() {
                matches.push(Match {
                    owner_id: entry.owner_id,
                    distance: distance as u8,
                });
            }
        }
    }

    ShardScan { matches, total }
}

/// Scan one shard under its read lock
pub fn scan_shard(shard: &Shard, params: QueryParams, budget: &ResultBudget) -> ShardScan {
    let entries = shard.read();
    scan_entries(&entries, params, budget)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(u64, u64)]) -> Vec<FingerprintEntry> {
        pairs.iter().map(|&(owner, hash)| FingerprintEntry::new(owner, hash)).collect()
    }

    fn unlimited() -> ResultBudget {
        ResultBudget::unlimited()
    }

    #[test]
    fn test_distance_is_popcount_of_xor() {
        let samples = [
            0u64,
            1,
            3,
            u64::MAX,
            0x8000_0000_0000_0000,
            0xDEAD_BEEF_CAFE_BABE,
            0x0123_4567_89AB_CDEF,
        ];
        for &a in &samples {
            assert_eq!(hamming_distance(a, a), 0);
            for &b in &samples {
                let expected = (0..64)
                    .filter(|bit| ((a >> bit) & 1) != ((b >> bit) & 1))
                    .count() as u32;
                assert_eq!(hamming_distance(a, b), expected);
                assert_eq!(hamming_distance(a, b), hamming_distance(b, a));
            }
        }
        assert_eq!(hamming_distance(0, u64::MAX), 64);
    }

    #[test]
    fn test_scan_threshold() {
        let data = entries(&[(1, 0x1), (2, 0x3)]);
        let scan = scan_entries(&data, QueryParams::new(0, 1), &unlimited());
        assert_eq!(scan.matches, vec![Match { owner_id: 1, distance: 1 }]);
        assert_eq!(scan.total, 1);
    }

    #[test]
    fn test_scan_exact_only_at_zero() {
        let data = entries(&[(7, u64::MAX), (8, u64::MAX - 1), (9, 0)]);
        let scan = scan_entries(&data, QueryParams::new(u64::MAX, 0), &unlimited());
        assert_eq!(scan.matches, vec![Match { owner_id: 7, distance: 0 }]);
    }

    #[test]
    fn test_scan_max_distance_returns_everything() {
        let data = entries(&[(1, 0), (2, u64::MAX), (3, 0xF0F0)]);
        for max_distance in [64u8, 200, 255] {
            let scan = scan_entries(&data, QueryParams::new(0, max_distance), &unlimited());
            assert_eq!(scan.matches.len(), 3);
        }
        let scan = scan_entries(&data, QueryParams::new(0, 63), &unlimited());
        assert_eq!(scan.total, 2);
    }

    #[test]
    fn test_scan_limit_keeps_counting() {
        let data = entries(&[(1, 0), (2, 0), (3, 0), (4, 1)]);
        let scan = scan_entries(&data, QueryParams::new(0, 0), &ResultBudget::new(2));
        assert_eq!(scan.matches.len(), 2);
        assert_eq!(scan.total, 3);
    }

    #[test]
    fn test_budget_shared_between_scans() {
        let first = entries(&[(1, 0), (2, 0), (3, 0)]);
        let second = entries(&[(4, 0), (5, 0), (6, 0)]);
        let budget = ResultBudget::new(4);

        let a = scan_entries(&first, QueryParams::new(0, 0), &budget);
        let b = scan_entries(&second, QueryParams::new(0, 0), &budget);
        assert_eq!(a.matches.len() + b.matches.len(), 4);
        assert_eq!(a.total + b.total, 6);
        assert!(!budget.try_take());
    }

    #[test]
    fn test_scan_empty() {
        let scan = scan_entries(&[], QueryParams::new(42, 64), &unlimited());
        assert!(scan.matches.is_empty());
        assert_eq!(scan.total, 0);
    }
}
