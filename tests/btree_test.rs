use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use strata::buffer::BufferPoolManager;
use strata::common::{PageId, RecordId, SlotId, INVALID_PAGE_ID};
use strata::index::{BPlusTree, SignedIntComparator, TreeNodeRef};
use strata::storage::disk::DiskManager;

fn rid(n: u32) -> RecordId {
    RecordId::new(PageId::new(n), SlotId::new((n % 100) as u16))
}

fn create_tree(leaf_max: u32, internal_max: u32) -> (BPlusTree, Arc<BufferPoolManager>, TempDir) {
    let dir = TempDir::new().unwrap();
    let dm = Arc::new(DiskManager::new(dir.path().join("btree.db")).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(128, 2, dm));
    let tree = BPlusTree::new(
        "t",
        Arc::clone(&bpm),
        Arc::new(SignedIntComparator),
        leaf_max,
        internal_max,
    )
    .unwrap();
    (tree, bpm, dir)
}

/// Walks the whole tree checking the structural invariants: parent links,
/// size bounds for non-root nodes, sorted keys, separator ranges, and a
/// totally ordered leaf chain.
fn validate_tree(bpm: &Arc<BufferPoolManager>, tree: &BPlusTree) {
    let root_id = tree.root_page_id();
    if root_id == INVALID_PAGE_ID {
        return;
    }

    let mut leaves = Vec::new();
    check_node(bpm, root_id, INVALID_PAGE_ID, None, None, &mut leaves);

    // The leaf chain must visit exactly the leaves found by the
    // depth-first walk, in key order.
    for window in leaves.windows(2) {
        let guard = bpm.fetch_read(window[0]).unwrap();
        let node = TreeNodeRef::new(guard.data());
        assert_eq!(node.next_page_id(), window[1], "broken leaf chain");
    }
    if let Some(&last) = leaves.last() {
        let guard = bpm.fetch_read(last).unwrap();
        assert_eq!(TreeNodeRef::new(guard.data()).next_page_id(), INVALID_PAGE_ID);
    }
}

fn check_node(
    bpm: &Arc<BufferPoolManager>,
    page_id: PageId,
    expected_parent: PageId,
    lower: Option<i32>,
    upper: Option<i32>,
    leaves: &mut Vec<PageId>,
) {
    let guard = bpm.fetch_read(page_id).unwrap();
    let node = TreeNodeRef::new(guard.data());
    let is_root = expected_parent == INVALID_PAGE_ID;

    assert_eq!(node.parent_page_id(), expected_parent, "bad parent link");
    assert!(node.size() <= node.max_size(), "node over capacity");
    if !is_root {
        assert!(
            node.size() >= node.min_size(),
            "non-root node underflow: {} < {}",
            node.size(),
            node.min_size()
        );
    }

    let in_range = |key: i32| {
        if let Some(lo) = lower {
            assert!(key >= lo, "key {} below separator {}", key, lo);
        }
        if let Some(hi) = upper {
            assert!(key < hi, "key {} at or above separator {}", key, hi);
        }
    };

    if node.is_leaf() {
        for i in 0..node.size() {
            let key = node.leaf_key_at(i) as i32;
            in_range(key);
            if i > 0 {
                assert!((node.leaf_key_at(i - 1) as i32) < key, "unsorted leaf");
            }
        }
        leaves.push(page_id);
        return;
    }

    assert!(node.size() >= 2 || !is_root, "internal root with one child");
    for i in 1..node.size() {
        let key = node.internal_key_at(i) as i32;
        in_range(key);
        if i > 1 {
            assert!((node.internal_key_at(i - 1) as i32) < key, "unsorted separators");
        }
    }

    let children: Vec<PageId> = (0..node.size()).map(|i| node.child_at(i)).collect();
    let seps: Vec<i32> = (1..node.size()).map(|i| node.internal_key_at(i) as i32).collect();
    drop(guard);

    for (i, &child) in children.iter().enumerate() {
        let child_lower = if i == 0 { lower } else { Some(seps[i - 1]) };
        let child_upper = if i == children.len() - 1 {
            upper
        } else {
            Some(seps[i])
        };
        check_node(bpm, child, page_id, child_lower, child_upper, leaves);
    }
}

#[test]
fn sequential_inserts_build_a_valid_tree() {
    // leaf_max = 4, internal_max = 4; inserting 1..=10 forces leaf and
    // root splits.
    let (tree, bpm, _dir) = create_tree(4, 4);

    for key in 1..=10u32 {
        assert!(tree.insert(key, rid(key)).unwrap());
    }
    validate_tree(&bpm, &tree);

    for key in 1..=10u32 {
        assert_eq!(tree.get_value(key).unwrap(), Some(rid(key)), "key {}", key);
    }
    assert_eq!(tree.get_value(11).unwrap(), None);

    let scanned: Vec<u32> = tree.begin().unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(scanned, (1..=10).collect::<Vec<_>>());
}

#[test]
fn removals_rebalance_without_lingering_underflow() {
    let (tree, bpm, _dir) = create_tree(4, 4);

    for key in 1..=10u32 {
        tree.insert(key, rid(key)).unwrap();
    }
    for key in [1u32, 2, 3] {
        tree.remove(key).unwrap();
        validate_tree(&bpm, &tree);
    }

    let scanned: Vec<u32> = tree.begin().unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(scanned, (4..=10).collect::<Vec<_>>());

    // Removing an absent key leaves the tree untouched.
    tree.remove(1).unwrap();
    validate_tree(&bpm, &tree);
}

#[test]
fn duplicate_insert_is_rejected_without_change() {
    let (tree, bpm, _dir) = create_tree(4, 4);

    for key in 1..=8u32 {
        tree.insert(key, rid(key)).unwrap();
    }
    assert!(!tree.insert(5, rid(999)).unwrap());
    assert_eq!(tree.get_value(5).unwrap(), Some(rid(5)));
    validate_tree(&bpm, &tree);
}

#[test]
fn range_scan_from_key_starts_at_lower_bound() {
    let (tree, _bpm, _dir) = create_tree(4, 4);

    for key in (10..=100u32).step_by(10) {
        tree.insert(key, rid(key)).unwrap();
    }

    let from_35: Vec<u32> = tree.begin_at(35).unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(from_35, vec![40, 50, 60, 70, 80, 90, 100]);

    let from_40: Vec<u32> = tree.begin_at(40).unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(from_40, vec![40, 50, 60, 70, 80, 90, 100]);

    let mut past_end = tree.begin_at(500).unwrap();
    assert_eq!(past_end.advance().unwrap(), None);
    assert!(past_end.is_end());
    assert!(past_end == tree.end());
}

#[test]
fn random_interleaving_matches_model() {
    let (tree, bpm, _dir) = create_tree(4, 4);
    let mut rng = StdRng::seed_from_u64(0xB71);
    let mut model: BTreeMap<u32, RecordId> = BTreeMap::new();

    for round in 0..3000 {
        let key = rng.gen_range(0..300u32);
        if rng.gen_bool(0.6) {
            let value = rid(key);
            let inserted = tree.insert(key, value).unwrap();
            assert_eq!(inserted, !model.contains_key(&key), "round {}", round);
            model.entry(key).or_insert(value);
        } else {
            tree.remove(key).unwrap();
            model.remove(&key);
        }
    }
    validate_tree(&bpm, &tree);

    for key in 0..300u32 {
        assert_eq!(
            tree.get_value(key).unwrap(),
            model.get(&key).copied(),
            "key {}",
            key
        );
    }

    let scanned: Vec<(u32, RecordId)> = tree
        .begin()
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    let expected: Vec<(u32, RecordId)> = model.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(scanned, expected);
}

#[test]
fn drain_and_refill() {
    let (tree, bpm, _dir) = create_tree(4, 4);

    for key in 1..=60u32 {
        tree.insert(key, rid(key)).unwrap();
    }
    for key in 1..=60u32 {
        tree.remove(key).unwrap();
    }
    assert!(tree.is_empty());
    assert_eq!(tree.root_page_id(), INVALID_PAGE_ID);

    for key in (1..=30u32).rev() {
        tree.insert(key, rid(key)).unwrap();
    }
    validate_tree(&bpm, &tree);
    let scanned: Vec<u32> = tree.begin().unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(scanned, (1..=30).collect::<Vec<_>>());
}
