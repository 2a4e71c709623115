//! Refresh queue tests
//!
//! Tests for queue mechanics including:
//! - Chunk/commit counts for branch-wide jobs
//! - Claim eligibility and stale-claim recovery
//! - Crash-and-reclaim timelines

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use pharmacy_erp_backend::services::refresh_queue::{chunk_count, claim_eligible};

const STALE_CLAIM_SECS: i64 = 3600;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_770_000_000 + secs, 0).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// A branch with N items produces ceil(N / chunk_size) commits
    #[test]
    fn test_chunk_count_ceiling() {
        assert_eq!(chunk_count(1, 200), 1);
        assert_eq!(chunk_count(200, 200), 1);
        assert_eq!(chunk_count(201, 200), 2);
        assert_eq!(chunk_count(1000, 200), 5);
        assert_eq!(chunk_count(1001, 200), 6);
    }

    /// An empty branch needs no commits
    #[test]
    fn test_chunk_count_empty() {
        assert_eq!(chunk_count(0, 200), 0);
    }

    /// A never-claimed, unprocessed job is eligible
    #[test]
    fn test_claim_never_claimed() {
        assert!(claim_eligible(None, None, at(0), STALE_CLAIM_SECS));
    }

    /// A freshly claimed job is not eligible for another worker
    #[test]
    fn test_claim_fresh_claim_excluded() {
        let claimed = at(0);
        assert!(!claim_eligible(
            Some(claimed),
            None,
            at(60),
            STALE_CLAIM_SECS
        ));
    }

    /// A claim older than the stale window is re-claimable
    #[test]
    fn test_claim_stale_reclaimable() {
        let claimed = at(0);
        assert!(claim_eligible(
            Some(claimed),
            None,
            at(STALE_CLAIM_SECS + 1),
            STALE_CLAIM_SECS
        ));
    }

    /// Exactly at the window boundary the claim is still held
    #[test]
    fn test_claim_boundary_still_held() {
        let claimed = at(0);
        assert!(!claim_eligible(
            Some(claimed),
            None,
            at(STALE_CLAIM_SECS),
            STALE_CLAIM_SECS
        ));
    }

    /// Processed jobs are never eligible again, stale claim or not
    #[test]
    fn test_claim_processed_excluded() {
        let claimed = at(0);
        let processed = at(120);
        assert!(!claim_eligible(
            Some(claimed),
            Some(processed),
            at(STALE_CLAIM_SECS * 2),
            STALE_CLAIM_SECS
        ));
    }

    /// Crash scenario: a worker claims a branch-wide job, commits the
    /// first chunk, then dies. The job stays invisible to other workers
    /// until the stale window passes, then becomes reclaimable.
    #[test]
    fn test_crash_after_first_chunk_timeline() {
        let claimed = at(0);
        // Shortly after the crash: still held by the dead worker
        assert!(!claim_eligible(Some(claimed), None, at(900), STALE_CLAIM_SECS));
        // After the stale window: another worker may restart the branch
        assert!(claim_eligible(
            Some(claimed),
            None,
            at(STALE_CLAIM_SECS + 60),
            STALE_CLAIM_SECS
        ));
    }

    /// Lease renewal scenario: a live worker re-touches claimed_at after
    /// each chunk, so a branch longer than the stale window is never
    /// overtaken while it keeps committing
    #[test]
    fn test_lease_renewal_keeps_claim() {
        // 10 chunks, each taking 10 minutes; claimed_at renewed per chunk
        let mut last_renewal = at(0);
        for chunk in 1..=10 {
            let now = at(chunk * 600);
            // Another worker checking just before this chunk's renewal
            assert!(!claim_eligible(
                Some(last_renewal),
                None,
                now,
                STALE_CLAIM_SECS
            ));
            last_renewal = now;
        }
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Chunks cover all items without overshooting by a full chunk
        #[test]
        fn prop_chunk_count_covers_items(
            total in 1i64..100_000,
            chunk_size in 1i64..2_000
        ) {
            let chunks = chunk_count(total, chunk_size);
            prop_assert!(chunks * chunk_size >= total);
            prop_assert!((chunks - 1) * chunk_size < total);
        }

        /// Claim eligibility is monotone in time: once a claim has gone
        /// stale, waiting longer never makes it ineligible again
        #[test]
        fn prop_staleness_monotone(
            age in 0i64..20_000,
            extra in 0i64..20_000
        ) {
            let claimed = at(0);
            if claim_eligible(Some(claimed), None, at(age), STALE_CLAIM_SECS) {
                prop_assert!(claim_eligible(
                    Some(claimed),
                    None,
                    at(age + extra),
                    STALE_CLAIM_SECS
                ));
            }
        }

        /// A processed job is ineligible at any point in time
        #[test]
        fn prop_processed_never_eligible(age in 0i64..100_000) {
            let claimed = at(0);
            let processed = at(1);
            prop_assert!(!claim_eligible(
                Some(claimed),
                Some(processed),
                at(age),
                STALE_CLAIM_SECS
            ));
        }
    }
}

// Timeline helper sanity check
#[test]
fn test_timeline_helper() {
    assert_eq!(at(60) - at(0), Duration::seconds(60));
}
