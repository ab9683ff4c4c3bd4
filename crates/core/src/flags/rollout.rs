//! Deterministic percentage rollout.
//!
//! `identity + feature_id` is hashed with a 31-multiplier rolling hash over
//! UTF-16 code units, wrapped to a signed 32-bit value and made
//! non-negative. The result modulo 100 is the bucket. A given identity
//! always lands in the same bucket for a feature, so admission never flaps
//! and raising the percentage only ever adds members.

use cortex_domain::constants::ROLLOUT_BUCKETS;

/// Stable 32-bit hash of `identity` followed by `feature_id`.
pub fn rollout_hash(identity: &str, feature_id: &str) -> u32 {
    identity
        .encode_utf16()
        .chain(feature_id.encode_utf16())
        .fold(0_i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
        .unsigned_abs()
}

/// Bucket in `0..100` for this identity and feature.
pub fn bucket(identity: &str, feature_id: &str) -> u32 {
    rollout_hash(identity, feature_id) % ROLLOUT_BUCKETS
}

/// Whether the identity falls inside the first `percentage` buckets.
pub fn in_bucket(identity: &str, feature_id: &str, percentage: u8) -> bool {
    bucket(identity, feature_id) < u32::from(percentage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_reference_values() {
        // "a" = 97, "ab" = 97 * 31 + 98
        assert_eq!(rollout_hash("a", ""), 97);
        assert_eq!(rollout_hash("a", "b"), 3105);
        assert_eq!(rollout_hash("", ""), 0);
    }

    #[test]
    fn hash_wraps_and_stays_non_negative() {
        let long = "cognitive-training-session-".repeat(20);
        let first = rollout_hash(&long, "memory_match");
        assert_eq!(first, rollout_hash(&long, "memory_match"));
        assert!(bucket(&long, "memory_match") < 100);
    }

    #[test]
    fn bucketing_is_deterministic() {
        for i in 0..500 {
            let id = format!("user-{i}");
            assert_eq!(in_bucket(&id, "daily_puzzle", 37), in_bucket(&id, "daily_puzzle", 37));
        }
    }

    #[test]
    fn raising_percentage_never_revokes() {
        for i in 0..2_000 {
            let id = format!("patient-{i}");
            let first_admitted = (0..=100).find(|&p| in_bucket(&id, "caregiver_chat", p));
            let Some(threshold) = first_admitted else {
                panic!("{id} not admitted even at 100%");
            };
            for p in threshold..=100 {
                assert!(in_bucket(&id, "caregiver_chat", p), "{id} revoked at {p}%");
            }
        }
    }

    #[test]
    fn zero_and_full_percentages() {
        for i in 0..200 {
            let id = format!("session-{i}");
            assert!(!in_bucket(&id, "f", 0));
            assert!(in_bucket(&id, "f", 100));
        }
    }

    #[test]
    fn half_rollout_admits_about_half() {
        let admitted =
            (0..10_000).filter(|i| in_bucket(&format!("user-{i}"), "f", 50)).count();
        assert!((4_500..=5_500).contains(&admitted), "admitted {admitted} of 10000");
    }

    #[test]
    fn admit_rate_tracks_percentage() {
        for percentage in [10_u8, 25, 75, 90] {
            let admitted = (0..10_000)
                .filter(|i| in_bucket(&format!("{i:08x}-visitor"), "brain_games", percentage))
                .count();
            let expected = usize::from(percentage) * 100;
            assert!(
                admitted.abs_diff(expected) <= 500,
                "{percentage}%: admitted {admitted}, expected about {expected}"
            );
        }
    }
}
