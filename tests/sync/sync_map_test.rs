/*!
 * SyncMap Tests
 * Insert-once semantics, snapshot refresh, and concurrent readers/writers
 */

use hazard_sync::{Domain, SmrConfig, SyncMap, SyncMapConfig};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serial_test::serial;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

#[test]
#[serial]
fn test_insert_does_not_overwrite() {
    let map = SyncMap::new();
    assert!(map.insert("a".to_string(), "1".to_string()));
    assert_eq!(map.lookup("a"), Some("1".to_string()));
    assert!(!map.insert("a".to_string(), "2".to_string()));
    assert_eq!(map.lookup("a"), Some("1".to_string()));
    assert!(map.domain().same_domain(Domain::global()));
}

#[test]
fn test_lookups_switch_to_snapshot_after_interval() {
    let map = SyncMap::with_config(Domain::new(), SyncMapConfig { refresh_interval: 10 }).unwrap();
    for i in 0..50 {
        map.insert(i, i * 2);
    }

    for round in 0..10 {
        assert!(!map.has_clean_snapshot(), "round {round}");
        assert_eq!(map.lookup(&round), Some(round * 2));
    }
    assert!(map.has_clean_snapshot());

    // New keys are visible at once even though the snapshot lacks them
    map.insert(100, 200);
    assert!(!map.has_clean_snapshot());
    assert_eq!(map.lookup(&100), Some(200));
    assert_eq!(map.len(), 51);
}

#[test]
fn test_lookup_of_missing_key() {
    let map: SyncMap<u32, u32> = SyncMap::with_domain(Domain::new());
    assert!(map.is_empty());
    assert_eq!(map.lookup(&7), None);
    map.refresh();
    assert_eq!(map.lookup(&7), None);
    assert!(!map.contains_key(&7));
}

#[test]
fn test_concurrent_readers_and_writers() {
    let domain = Domain::with_config(SmrConfig {
        scan_threshold: 4,
        ..Default::default()
    })
    .unwrap();
    let map = Arc::new(
        SyncMap::with_config(domain.clone(), SyncMapConfig { refresh_interval: 16 }).unwrap(),
    );
    let keys = 512u64;

    let writers: Vec<_> = (0..2u64)
        .map(|w| {
            let map = map.clone();
            thread::spawn(move || {
                let mut won = 0;
                for k in 0..keys {
                    if map.insert(k, k * 10 + w) {
                        won += 1;
                    }
                }
                won
            })
        })
        .collect();

    let readers: Vec<_> = (0..4u64)
        .map(|seed| {
            let map = map.clone();
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..20_000 {
                    let k = rng.gen_range(0..keys);
                    if let Some(v) = map.lookup(&k) {
                        // Whichever writer won, the value belongs to this key
                        assert_eq!(v / 10, k);
                    }
                }
            })
        })
        .collect();

    let inserted: u64 = writers.into_iter().map(|w| w.join().unwrap()).sum();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(inserted, keys);
    assert_eq!(map.len(), keys as usize);
    for k in 0..keys {
        assert_eq!(map.lookup(&k).map(|v| v / 10), Some(k));
    }

    let stats = domain.stats();
    assert!(stats.reclaimed <= stats.retired);
}

#[test]
fn test_values_stay_stable_once_published() {
    let map = Arc::new(SyncMap::with_config(Domain::new(), SyncMapConfig::eager()).unwrap());
    map.insert("stable".to_string(), 1u32);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let map = map.clone();
            thread::spawn(move || {
                for i in 0..2_000u32 {
                    if t == 0 {
                        map.insert(format!("k{i}"), i);
                    }
                    assert_eq!(map.lookup("stable"), Some(1));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(map.len(), 2_001);
}

proptest! {
    #[test]
    fn prop_matches_first_insert_wins_model(
        entries in prop::collection::vec((0u8..32, any::<u16>()), 0..200),
        interval in 1usize..8,
    ) {
        let map = SyncMap::with_config(Domain::new(), SyncMapConfig { refresh_interval: interval }).unwrap();
        let mut model = HashMap::new();

        for (k, v) in entries {
            let fresh = !model.contains_key(&k);
            prop_assert_eq!(map.insert(k, v), fresh);
            model.entry(k).or_insert(v);

            for probe in 0..32u8 {
                prop_assert_eq!(map.lookup(&probe), model.get(&probe).copied());
            }
        }
        prop_assert_eq!(map.len(), model.len());
    }
}
