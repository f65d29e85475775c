use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{BuildHasher, BuildHasherDefault, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use strata::container::ExtendibleHashTable;

/// Passes integer keys through unchanged, so tests control exactly which
/// directory slots keys land in.
#[derive(Default, Clone)]
struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        let mut raw = [0u8; 8];
        raw[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
        self.0 = u64::from_le_bytes(raw);
    }

    fn write_u32(&mut self, v: u32) {
        self.0 = v as u64;
    }

    fn write_u64(&mut self, v: u64) {
        self.0 = v;
    }
}

#[derive(Default, Clone)]
struct BuildIdentity;

impl BuildHasher for BuildIdentity {
    type Hasher = IdentityHasher;

    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher::default()
    }
}

fn assert_depth_invariant<K, V, S>(table: &ExtendibleHashTable<K, V, S>)
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    let gd = table.global_depth();
    for slot in 0..(1usize << gd) {
        assert!(
            table.local_depth(slot) <= gd,
            "slot {} has local depth {} > global depth {}",
            slot,
            table.local_depth(slot),
            gd
        );
    }
}

#[test]
fn colliding_keys_force_directory_growth() {
    // bucket_size = 2; keys 0, 4, 8 share low bits (hash to slot 0) and
    // 1, 5 hash to slot 1. Separating the third colliding key requires a
    // global depth of at least 2.
    let table: ExtendibleHashTable<u32, u32, BuildIdentity> =
        ExtendibleHashTable::with_hasher(2, BuildIdentity);

    for key in [0u32, 4, 8, 1, 5] {
        table.insert(key, key * 10);
    }

    assert!(table.global_depth() >= 2, "gd = {}", table.global_depth());
    assert_depth_invariant(&table);

    for key in [0u32, 4, 8, 1, 5] {
        assert_eq!(table.find(&key), Some(key * 10), "key {} lost", key);
    }

    assert!(!table.remove(&7), "removing an absent key must miss");
    assert!(table.remove(&4));
    assert_eq!(table.find(&4), None);
    assert_eq!(table.len(), 4);
}

#[test]
fn bucket_count_stays_proportional_to_load() {
    // After N random inserts with bucket size B, the table must not
    // fragment: NumBuckets <= ceil(N/B) * 2.
    const N: usize = 512;
    const B: usize = 8;

    let table: ExtendibleHashTable<u64, usize, BuildHasherDefault<DefaultHasher>> =
        ExtendibleHashTable::with_hasher(B, BuildHasherDefault::default());
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut expected = HashMap::new();

    for i in 0..N {
        let key: u64 = rng.gen();
        table.insert(key, i);
        expected.insert(key, i);
    }

    let bound = N.div_ceil(B) * 2;
    assert!(
        table.num_buckets() <= bound,
        "{} buckets exceeds bound {}",
        table.num_buckets(),
        bound
    );
    assert_depth_invariant(&table);

    for (key, value) in &expected {
        assert_eq!(table.find(key), Some(*value));
    }
    assert_eq!(table.len(), expected.len());
}

#[test]
fn updates_and_removals_under_churn() {
    let table: ExtendibleHashTable<u64, u64, BuildHasherDefault<DefaultHasher>> =
        ExtendibleHashTable::with_hasher(4, BuildHasherDefault::default());
    let mut rng = StdRng::seed_from_u64(42);
    let mut model: HashMap<u64, u64> = HashMap::new();

    for _ in 0..2000 {
        let key = rng.gen_range(0..200u64);
        match rng.gen_range(0..3) {
            0 | 1 => {
                let value: u64 = rng.gen();
                table.insert(key, value);
                model.insert(key, value);
            }
            _ => {
                assert_eq!(table.remove(&key), model.remove(&key).is_some());
            }
        }
    }

    for key in 0..200u64 {
        assert_eq!(table.find(&key), model.get(&key).copied(), "key {}", key);
    }
    assert_eq!(table.len(), model.len());
    assert_depth_invariant(&table);
}
