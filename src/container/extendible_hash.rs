use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

use parking_lot::Mutex;

/// A bucket holds at most `bucket_size` key/value pairs and distinguishes
/// the low `depth` bits of the hash.
#[derive(Debug)]
struct Bucket<K, V> {
    items: Vec<(K, V)>,
    depth: usize,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(depth: usize) -> Self {
        Self {
            items: Vec::new(),
            depth,
        }
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        if let Some(pos) = self.items.iter().position(|(k, _)| k == key) {
            self.items.remove(pos);
            true
        } else {
            false
        }
    }

    /// Inserts or updates by key. Returns false when the bucket is full
    /// and the key is not already present.
    fn insert(&mut self, key: K, value: V, bucket_size: usize) -> bool {
        if let Some(pos) = self.items.iter().position(|(k, _)| *k == key) {
            self.items[pos].1 = value;
            return true;
        }
        if self.items.len() >= bucket_size {
            return false;
        }
        self.items.push((key, value));
        true
    }
}

struct TableState<K, V> {
    global_depth: usize,
    /// Directory slots hold indices into `buckets`; many slots may share
    /// one bucket, so rebinding a slot never copies entries.
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
    len: usize,
}

/// Extendible hash table with dynamic directory doubling.
///
/// Serves both as a general associative container and as the buffer pool's
/// `page_id -> frame_id` directory. A single mutex serializes all
/// operations. Buckets live in an arena and the directory holds bucket
/// indices, so updating a bucket is visible from every slot that refers
/// to it.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    bucket_size: usize,
    hasher: S,
    state: Mutex<TableState<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> ExtendibleHashTable<K, V> {
    /// Creates a table with a single depth-0 bucket.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    pub fn with_hasher(bucket_size: usize, hasher: S) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");
        Self {
            bucket_size,
            hasher,
            state: Mutex::new(TableState {
                global_depth: 0,
                dir: vec![0],
                buckets: vec![Bucket::new(0)],
                len: 0,
            }),
        }
    }

    fn hash(&self, key: &K) -> u64 {
        let mut h = self.hasher.build_hasher();
        key.hash(&mut h);
        h.finish()
    }

    /// Directory slot for a key: the low `global_depth` bits of its hash.
    fn index_of(hash: u64, global_depth: usize) -> usize {
        (hash & ((1u64 << global_depth) - 1)) as usize
    }

    pub fn find(&self, key: &K) -> Option<V> {
        let state = self.state.lock();
        let idx = Self::index_of(self.hash(key), state.global_depth);
        state.buckets[state.dir[idx]].find(key).cloned()
    }

    pub fn remove(&self, key: &K) -> bool {
        let mut state = self.state.lock();
        let idx = Self::index_of(self.hash(key), state.global_depth);
        let bucket = state.dir[idx];
        let removed = state.buckets[bucket].remove(key);
        if removed {
            state.len -= 1;
        }
        removed
    }

    /// Inserts or updates the value for a key.
    ///
    /// Each failed round either doubles the directory or splits the target
    /// bucket, so the loop terminates once the keys hashing to the bucket
    /// spread across the new bit.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash(&key);
        let mut state = self.state.lock();

        loop {
            let idx = Self::index_of(hash, state.global_depth);
            let bucket = state.dir[idx];
            let had_key = state.buckets[bucket].find(&key).is_some();
            if state.buckets[bucket].insert(key.clone(), value.clone(), self.bucket_size) {
                if !had_key {
                    state.len += 1;
                }
                return;
            }

            if state.buckets[bucket].depth == state.global_depth {
                // Double the directory; each new slot points at its
                // low-bit twin's bucket.
                let dir_size = state.dir.len();
                for i in 0..dir_size {
                    let b = state.dir[i];
                    state.dir.push(b);
                }
                state.global_depth += 1;
            } else {
                self.split_bucket(&mut state, idx);
            }
        }
    }

    /// Splits the bucket referenced by directory slot `idx` into itself and
    /// an image bucket at depth `ld + 1`.
    ///
    /// Every directory slot whose low `ld + 1` bits equal the image tag is
    /// rebound to the image bucket; the remaining slots that shared the old
    /// tag keep the original. Entries partition by the same rule. The old
    /// tag derives from the directory slot, so an empty bucket splits
    /// correctly too.
    fn split_bucket(&self, state: &mut TableState<K, V>, idx: usize) {
        let bucket = state.dir[idx];
        let old_depth = state.buckets[bucket].depth;
        let new_depth = old_depth + 1;
        let old_tag = idx & ((1 << old_depth) - 1);
        let image_tag = old_tag | (1 << old_depth);

        state.buckets[bucket].depth = new_depth;
        let mut image = Bucket::new(new_depth);

        let mask = (1 << new_depth) - 1;
        let mut kept = Vec::new();
        for (k, v) in state.buckets[bucket].items.drain(..) {
            if (self.hash(&k) as usize) & mask == image_tag {
                image.items.push((k, v));
            } else {
                kept.push((k, v));
            }
        }
        state.buckets[bucket].items = kept;

        let image_index = state.buckets.len();
        state.buckets.push(image);

        for slot in 0..state.dir.len() {
            if slot & mask == image_tag {
                state.dir[slot] = image_index;
            }
        }
    }

    pub fn global_depth(&self) -> usize {
        self.state.lock().global_depth
    }

    /// Local depth of the bucket referenced by a directory slot.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let state = self.state.lock();
        state.buckets[state.dir[dir_index]].depth
    }

    pub fn num_buckets(&self) -> usize {
        self.state.lock().buckets.len()
    }

    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries, in no particular order.
    pub fn entries(&self) -> Vec<(K, V)> {
        let state = self.state.lock();
        state
            .buckets
            .iter()
            .flat_map(|b| b.items.iter().cloned())
            .collect()
    }
}
