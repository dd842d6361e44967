//! Property-based round-trips over arbitrary key/value sets and
//! compression levels.

use std::collections::BTreeMap;

use hali::{HaliIndex, OrderedIndex};
use proptest::prelude::*;

const LEVELS: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn build_round_trips(
        entries in prop::collection::btree_map(any::<u64>(), any::<u64>(), 1..400),
        level_idx in 0..LEVELS.len(),
        probe in any::<u64>(),
    ) {
        let keys: Vec<u64> = entries.keys().copied().collect();
        let values: Vec<u64> = entries.values().copied().collect();

        let mut index = HaliIndex::with_compression(LEVELS[level_idx]);
        index.build(&keys, &values).unwrap();

        prop_assert_eq!(index.len(), entries.len());
        for (&k, &v) in &entries {
            prop_assert_eq!(index.find(k), Some(v));
        }
        if !entries.contains_key(&probe) {
            prop_assert_eq!(index.find(probe), None);
        }
    }

    #[test]
    fn insert_then_erase_round_trips(
        entries in prop::collection::btree_map(any::<u64>(), any::<u64>(), 1..200),
        fresh in prop::collection::vec((any::<u64>(), any::<u64>()), 1..50),
        level_idx in 0..LEVELS.len(),
    ) {
        let keys: Vec<u64> = entries.keys().copied().collect();
        let values: Vec<u64> = entries.values().copied().collect();

        let mut index = HaliIndex::with_compression(LEVELS[level_idx]);
        index.build(&keys, &values).unwrap();

        let mut delta = BTreeMap::new();
        for &(k, v) in &fresh {
            let expected = !entries.contains_key(&k) && !delta.contains_key(&k);
            prop_assert_eq!(index.insert(k, v), expected);
            if expected {
                delta.insert(k, v);
            }
        }

        prop_assert_eq!(index.len(), entries.len() + delta.len());

        // First-insert-wins: a built key keeps its built value, a fresh
        // key keeps the first inserted value.
        for (&k, &v) in &entries {
            prop_assert_eq!(index.find(k), Some(v));
        }
        for (&k, &v) in &delta {
            prop_assert_eq!(index.find(k), Some(v));
        }

        // Erase removes exactly the delta keys.
        for &k in delta.keys() {
            prop_assert!(index.erase(k));
            prop_assert_eq!(index.find(k), None);
        }
        for &k in entries.keys() {
            prop_assert!(!index.erase(k));
            prop_assert_eq!(index.find(k), Some(entries[&k]));
        }
        prop_assert_eq!(index.len(), entries.len());
    }

    #[test]
    fn duplicate_build_input_always_rejected(
        keys in prop::collection::vec(any::<u64>(), 2..100),
        dup_idx in 0..100usize,
    ) {
        let mut with_dup = keys.clone();
        let dup = with_dup[dup_idx % with_dup.len()];
        with_dup.push(dup);
        let values: Vec<u64> = with_dup.iter().map(|k| k ^ 7).collect();

        let mut index = HaliIndex::new();
        prop_assert!(index.build(&with_dup, &values).is_err());
        prop_assert_eq!(index.len(), 0);
    }
}
