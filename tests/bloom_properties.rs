//! Property-based tests for `BloomFilter`'s false-positive rate and
//! determinism, grounded on the teacher pack's use of `proptest` for
//! ring/queue invariants.

use std::collections::HashSet;

use proptest::prelude::*;
use ringfence::BloomFilter;

proptest! {
    /// No false negatives: every inserted key is reported as a member.
    #[test]
    fn no_false_negatives(keys in prop::collection::hash_set(prop::collection::vec(any::<u8>(), 1..16), 1..200)) {
        let mut bloom = BloomFilter::new(keys.len().max(1), 0.01).unwrap();
        for key in &keys {
            bloom.insert(key);
        }
        for key in &keys {
            prop_assert!(bloom.member(key));
        }
    }

    /// Two filters built with identical parameters over identical inputs,
    /// in the same order, are bit-identical.
    #[test]
    fn deterministic_for_identical_inputs(n in 16usize..500, seed_keys in prop::collection::vec(any::<u32>(), 1..100)) {
        let mut a = BloomFilter::new(n, 0.05).unwrap();
        let mut b = BloomFilter::new(n, 0.05).unwrap();

        for key in &seed_keys {
            a.insert(&key.to_le_bytes());
            b.insert(&key.to_le_bytes());
        }

        prop_assert_eq!(a.num_bits(), b.num_bits());
        prop_assert_eq!(a.num_hashes(), b.num_hashes());
        for probe in 0u32..256 {
            prop_assert_eq!(a.member(&probe.to_le_bytes()), b.member(&probe.to_le_bytes()));
        }
    }
}

#[test]
fn measured_false_positive_rate_is_within_target_for_a_large_disjoint_probe_set() {
    const N: usize = 100_000;
    const P: f64 = 0.01;

    let mut bloom = BloomFilter::new(N, P).unwrap();
    for i in 0..(N as u32) {
        bloom.insert(&i.to_le_bytes());
    }

    let inserted: HashSet<u32> = (0..(N as u32)).collect();
    let mut false_positives = 0usize;
    let mut probes = 0usize;

    for i in (N as u32)..(2 * N as u32) {
        if inserted.contains(&i) {
            continue;
        }
        probes += 1;
        if bloom.member(&i.to_le_bytes()) {
            false_positives += 1;
        }
    }

    let measured_rate = (false_positives as f64) / (probes as f64);
    assert!(
        measured_rate < P + 0.01,
        "measured false-positive rate {measured_rate} exceeds target {P} by more than 0.01"
    );
}

#[test]
fn clear_resets_membership_for_previously_inserted_keys() {
    let mut bloom = BloomFilter::new(1000, 0.01).unwrap();
    let keys: Vec<[u8; 4]> = (0u32..500).map(|i| i.to_le_bytes()).collect();

    for key in &keys {
        bloom.insert(key);
    }
    assert!(bloom.count() > 0);

    bloom.clear();
    assert_eq!(bloom.count(), 0);
    for key in &keys {
        assert!(!bloom.member(key));
    }
}
