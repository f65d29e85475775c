use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{
    PageId, RecordId, Result, StrataError, HEADER_PAGE_ID, INVALID_PAGE_ID, PAGE_SIZE,
};
use crate::storage::page::{HeaderPage, HeaderPageRef};

use super::index_iterator::IndexIterator;
use super::key_comparator::{IndexKey, KeyComparator};
use super::tree_page::{
    TreeNode, TreeNodeRef, INTERNAL_ENTRY_SIZE, INTERNAL_HEADER_SIZE, LEAF_ENTRY_SIZE,
    LEAF_HEADER_SIZE,
};

/// Root bookkeeping guarded by the tree latch: the current root page and
/// whether the header page already carries a record for this index.
struct RootInfo {
    page_id: PageId,
    recorded: bool,
}

/// Disk-resident B+ tree keyed by an injected comparator, mapping unique
/// keys to record ids. Every node is a buffer pool page; leaves form a
/// singly-linked list in key order for range scans.
///
/// A single reader/writer latch protects the root page id and serializes
/// structure modification: lookups and scans take it shared, insert and
/// remove take it exclusive.
pub struct BPlusTree {
    index_name: String,
    bpm: Arc<BufferPoolManager>,
    comparator: Arc<dyn KeyComparator>,
    leaf_max_size: u32,
    internal_max_size: u32,
    root: RwLock<RootInfo>,
}

impl BPlusTree {
    /// Opens the named index, picking up its root from the header page if
    /// a record exists; otherwise the tree starts empty and registers
    /// itself on first insert.
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: Arc<dyn KeyComparator>,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Result<Self> {
        assert!(leaf_max_size >= 2 && internal_max_size >= 3, "degenerate fanout");
        assert!(
            LEAF_HEADER_SIZE + (leaf_max_size as usize + 1) * LEAF_ENTRY_SIZE <= PAGE_SIZE,
            "leaf_max_size does not fit a page"
        );
        assert!(
            INTERNAL_HEADER_SIZE + (internal_max_size as usize + 1) * INTERNAL_ENTRY_SIZE
                <= PAGE_SIZE,
            "internal_max_size does not fit a page"
        );

        let index_name = index_name.into();
        let recorded_root = {
            let guard = bpm.fetch_read(HEADER_PAGE_ID)?;
            HeaderPageRef::new(guard.data()).get_root_id(&index_name)
        };

        Ok(Self {
            index_name,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            root: RwLock::new(RootInfo {
                page_id: recorded_root.unwrap_or(INVALID_PAGE_ID),
                recorded: recorded_root.is_some(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.index_name
    }

    pub fn is_empty(&self) -> bool {
        self.root.read().page_id == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        self.root.read().page_id
    }

    /// Point lookup.
    pub fn get_value(&self, key: IndexKey) -> Result<Option<RecordId>> {
        let root = self.root.read();
        if root.page_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let leaf_id = self.find_leaf(root.page_id, key)?;
        let guard = self.bpm.fetch_read(leaf_id)?;
        Ok(TreeNodeRef::new(guard.data()).leaf_find(key, &*self.comparator))
    }

    /// Inserts a unique key. Returns false (leaving the tree untouched)
    /// when the key already exists.
    pub fn insert(&self, key: IndexKey, rid: RecordId) -> Result<bool> {
        let mut root = self.root.write();

        if root.page_id == INVALID_PAGE_ID {
            let mut guard = self.bpm.new_page()?;
            let page_id = guard.page_id();
            let mut node = TreeNode::new(guard.data_mut());
            node.init_leaf(page_id, INVALID_PAGE_ID, self.leaf_max_size);
            node.leaf_insert(key, rid, &*self.comparator);
            drop(guard);

            root.page_id = page_id;
            self.sync_header(&mut root)?;
            return Ok(true);
        }

        let leaf_id = self.find_leaf(root.page_id, key)?;
        let mut guard = self.bpm.fetch_write(leaf_id)?;

        // Probe through the read view first: a duplicate must not dirty
        // the page.
        if TreeNodeRef::new(guard.data())
            .leaf_find(key, &*self.comparator)
            .is_some()
        {
            return Ok(false);
        }

        let (new_size, parent_id) = {
            let mut node = TreeNode::new(guard.data_mut());
            let Some(new_size) = node.leaf_insert(key, rid, &*self.comparator) else {
                return Ok(false);
            };
            (new_size, node.parent_page_id())
        };

        if new_size <= self.leaf_max_size as usize {
            return Ok(true);
        }

        // Overflow: split the leaf and propagate the new leaf's first key.
        let mut new_guard = self.bpm.new_page()?;
        let new_leaf_id = new_guard.page_id();

        let split_key = {
            let mut node = TreeNode::new(guard.data_mut());
            let keep = new_size / 2;
            let moved = node.leaf_split_off(keep);
            let old_next = node.next_page_id();
            node.set_next_page_id(new_leaf_id);

            let mut new_node = TreeNode::new(new_guard.data_mut());
            new_node.init_leaf(new_leaf_id, parent_id, self.leaf_max_size);
            new_node.leaf_extend(&moved);
            new_node.set_next_page_id(old_next);
            moved[0].0
        };
        drop(new_guard);
        drop(guard);
        debug!(index = %self.index_name, split_key, "leaf split");

        self.insert_to_parent(&mut root, leaf_id, parent_id, split_key, new_leaf_id)?;
        Ok(true)
    }

    /// Removes a key; absent keys are a no-op.
    pub fn remove(&self, key: IndexKey) -> Result<()> {
        let mut root = self.root.write();
        if root.page_id == INVALID_PAGE_ID {
            return Ok(());
        }

        let leaf_id = self.find_leaf(root.page_id, key)?;
        let (size, parent_id) = {
            let mut guard = self.bpm.fetch_write(leaf_id)?;
            if TreeNodeRef::new(guard.data())
                .leaf_find(key, &*self.comparator)
                .is_none()
            {
                return Ok(());
            }
            let mut node = TreeNode::new(guard.data_mut());
            node.leaf_remove(key, &*self.comparator);
            (node.size(), node.parent_page_id())
        };

        if parent_id == INVALID_PAGE_ID {
            // Leaf root: the only size rule is that an empty root dies.
            if size == 0 {
                self.bpm.delete_page(leaf_id)?;
                root.page_id = INVALID_PAGE_ID;
                self.sync_header(&mut root)?;
            }
            return Ok(());
        }

        if size >= self.min_leaf_size() {
            return Ok(());
        }
        self.rebalance(&mut root, leaf_id)
    }

    /// Iterator positioned at the smallest key.
    pub fn begin(&self) -> Result<IndexIterator> {
        let root = self.root.read();
        if root.page_id == INVALID_PAGE_ID {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm)));
        }

        let mut page_id = root.page_id;
        loop {
            let guard = self.bpm.fetch_read(page_id)?;
            let node = TreeNodeRef::new(guard.data());
            if node.is_leaf() {
                return Ok(IndexIterator::new(Arc::clone(&self.bpm), page_id, 0));
            }
            page_id = node.child_at(0);
        }
    }

    /// Iterator positioned at the first key >= `key`.
    pub fn begin_at(&self, key: IndexKey) -> Result<IndexIterator> {
        let root = self.root.read();
        if root.page_id == INVALID_PAGE_ID {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm)));
        }

        let leaf_id = self.find_leaf(root.page_id, key)?;
        let guard = self.bpm.fetch_read(leaf_id)?;
        let slot = TreeNodeRef::new(guard.data()).leaf_lower_bound(key, &*self.comparator);
        Ok(IndexIterator::new(Arc::clone(&self.bpm), leaf_id, slot))
    }

    /// The end sentinel; any iterator that has walked off the last leaf
    /// compares equal to it.
    pub fn end(&self) -> IndexIterator {
        IndexIterator::end(Arc::clone(&self.bpm))
    }

    fn min_leaf_size(&self) -> usize {
        (self.leaf_max_size as usize + 1) / 2
    }

    fn min_internal_size(&self) -> usize {
        (self.internal_max_size as usize + 1) / 2
    }

    /// Descends from `start` to the leaf that covers `key`.
    fn find_leaf(&self, start: PageId, key: IndexKey) -> Result<PageId> {
        let mut page_id = start;
        loop {
            let guard = self.bpm.fetch_read(page_id)?;
            let node = TreeNodeRef::new(guard.data());
            if node.is_leaf() {
                return Ok(page_id);
            }
            page_id = node.internal_lookup(key, &*self.comparator);
        }
    }

    /// Links a freshly split-off node into the tree above it, growing a
    /// new root when `old_id` was the root.
    fn insert_to_parent(
        &self,
        root: &mut RootInfo,
        old_id: PageId,
        parent_id: PageId,
        split_key: IndexKey,
        new_id: PageId,
    ) -> Result<()> {
        if parent_id == INVALID_PAGE_ID {
            let mut root_guard = self.bpm.new_page()?;
            let root_id = root_guard.page_id();
            {
                let mut node = TreeNode::new(root_guard.data_mut());
                node.init_internal(root_id, INVALID_PAGE_ID, self.internal_max_size);
                node.internal_init_root(old_id, split_key, new_id);
            }
            drop(root_guard);

            for child in [old_id, new_id] {
                let mut guard = self.bpm.fetch_write(child)?;
                TreeNode::new(guard.data_mut()).set_parent_page_id(root_id);
            }

            root.page_id = root_id;
            self.sync_header(root)?;
            debug!(index = %self.index_name, root = root_id.as_u32(), "new root");
            return Ok(());
        }

        let mut parent_guard = self.bpm.fetch_write(parent_id)?;
        let (new_size, grandparent_id) = {
            let mut node = TreeNode::new(parent_guard.data_mut());
            node.internal_insert_after(old_id, split_key, new_id);
            (node.size(), node.parent_page_id())
        };

        if new_size <= self.internal_max_size as usize {
            return Ok(());
        }

        // The parent overflowed in turn: split it and recurse with the
        // pushed-up key.
        let mut new_guard = self.bpm.new_page()?;
        let new_internal_id = new_guard.page_id();

        let (push_key, moved) = {
            let mut node = TreeNode::new(parent_guard.data_mut());
            let (push_key, moved) = node.internal_split_off_upper();
            let mut new_node = TreeNode::new(new_guard.data_mut());
            new_node.init_internal(new_internal_id, grandparent_id, self.internal_max_size);
            new_node.internal_extend(&moved);
            (push_key, moved)
        };
        drop(new_guard);
        drop(parent_guard);
        debug!(index = %self.index_name, push_key, "internal split");

        // Children that changed homes must learn their new parent, or the
        // tree silently corrupts on the next structural change.
        for &(_, child) in &moved {
            let mut guard = self.bpm.fetch_write(child)?;
            TreeNode::new(guard.data_mut()).set_parent_page_id(new_internal_id);
        }

        self.insert_to_parent(root, parent_id, grandparent_id, push_key, new_internal_id)
    }

    /// Restores the minimum-size invariant for an underflowing node by
    /// borrowing from a sibling or merging with one, recursing up when the
    /// parent underflows in turn.
    fn rebalance(&self, root: &mut RootInfo, page_id: PageId) -> Result<()> {
        let (is_leaf, size, parent_id) = {
            let guard = self.bpm.fetch_read(page_id)?;
            let node = TreeNodeRef::new(guard.data());
            (node.is_leaf(), node.size(), node.parent_page_id())
        };

        if parent_id == INVALID_PAGE_ID {
            // The root is exempt from minimum sizes, but collapses when an
            // internal root is down to a single child (and an empty leaf
            // root empties the tree).
            if !is_leaf && size == 1 {
                let child_id = {
                    let guard = self.bpm.fetch_read(page_id)?;
                    TreeNodeRef::new(guard.data()).child_at(0)
                };
                {
                    let mut guard = self.bpm.fetch_write(child_id)?;
                    TreeNode::new(guard.data_mut()).set_parent_page_id(INVALID_PAGE_ID);
                }
                self.bpm.delete_page(page_id)?;
                root.page_id = child_id;
                self.sync_header(root)?;
                debug!(index = %self.index_name, root = child_id.as_u32(), "root collapsed");
            } else if is_leaf && size == 0 {
                self.bpm.delete_page(page_id)?;
                root.page_id = INVALID_PAGE_ID;
                self.sync_header(root)?;
            }
            return Ok(());
        }

        let mut parent_guard = self.bpm.fetch_write(parent_id)?;
        let idx = TreeNodeRef::new(parent_guard.data())
            .child_index_of(page_id)
            .ok_or_else(|| {
                StrataError::IndexCorrupted(format!(
                    "page {} missing from its parent {}",
                    page_id, parent_id
                ))
            })?;
        let parent_size = TreeNodeRef::new(parent_guard.data()).size();

        // Borrow from the left sibling when it has surplus.
        if idx > 0 {
            let left_id = TreeNodeRef::new(parent_guard.data()).child_at(idx - 1);
            let mut left_guard = self.bpm.fetch_write(left_id)?;
            if TreeNodeRef::new(left_guard.data()).size() > self.min_size_of(is_leaf) {
                let mut node_guard = self.bpm.fetch_write(page_id)?;
                let mut parent = TreeNode::new(parent_guard.data_mut());
                let mut left = TreeNode::new(left_guard.data_mut());
                let mut node = TreeNode::new(node_guard.data_mut());

                if is_leaf {
                    let (key, rid) = left.leaf_pop_back();
                    node.leaf_push_front(key, rid);
                    parent.internal_set_key_at(idx, key);
                } else {
                    let (moved_key, moved_child) = left.internal_pop_back();
                    let old_sep = parent.internal_key_at(idx);
                    node.internal_push_front(moved_child, old_sep);
                    parent.internal_set_key_at(idx, moved_key);
                    drop(node);
                    drop(left);
                    drop(parent);
                    drop(node_guard);
                    let mut guard = self.bpm.fetch_write(moved_child)?;
                    TreeNode::new(guard.data_mut()).set_parent_page_id(page_id);
                }
                return Ok(());
            }
        }

        // Borrow from the right sibling when it has surplus.
        if idx + 1 < parent_size {
            let right_id = TreeNodeRef::new(parent_guard.data()).child_at(idx + 1);
            let mut right_guard = self.bpm.fetch_write(right_id)?;
            if TreeNodeRef::new(right_guard.data()).size() > self.min_size_of(is_leaf) {
                let mut node_guard = self.bpm.fetch_write(page_id)?;
                let mut parent = TreeNode::new(parent_guard.data_mut());
                let mut right = TreeNode::new(right_guard.data_mut());
                let mut node = TreeNode::new(node_guard.data_mut());

                if is_leaf {
                    let (key, rid) = right.leaf_pop_front();
                    node.leaf_extend(&[(key, rid)]);
                    parent.internal_set_key_at(idx + 1, right.leaf_key_at(0));
                } else {
                    let (first_child, promoted_key) = right.internal_pop_front();
                    let old_sep = parent.internal_key_at(idx + 1);
                    node.internal_push_back(old_sep, first_child);
                    parent.internal_set_key_at(idx + 1, promoted_key);
                    drop(node);
                    drop(right);
                    drop(parent);
                    drop(node_guard);
                    let mut guard = self.bpm.fetch_write(first_child)?;
                    TreeNode::new(guard.data_mut()).set_parent_page_id(page_id);
                }
                return Ok(());
            }
        }

        // No sibling can lend: merge. Prefer absorbing into the left
        // sibling; at the leftmost slot, absorb the right sibling instead.
        let (left_id, right_id, sep_slot) = if idx > 0 {
            let left_id = TreeNodeRef::new(parent_guard.data()).child_at(idx - 1);
            (left_id, page_id, idx)
        } else {
            let right_id = TreeNodeRef::new(parent_guard.data()).child_at(idx + 1);
            (page_id, right_id, idx + 1)
        };
        self.merge_into_left(&mut parent_guard, left_id, right_id, sep_slot)?;

        let (parent_size, parent_parent) = {
            let node = TreeNodeRef::new(parent_guard.data());
            (node.size(), node.parent_page_id())
        };
        drop(parent_guard);

        let parent_is_root = parent_parent == INVALID_PAGE_ID;
        if (parent_is_root && parent_size == 1)
            || (!parent_is_root && parent_size < self.min_internal_size())
        {
            return self.rebalance(root, parent_id);
        }
        Ok(())
    }

    /// Moves every entry of `right_id` into `left_id`, splices the leaf
    /// chain, deletes the emptied page and drops its separator from the
    /// parent.
    fn merge_into_left(
        &self,
        parent_guard: &mut crate::buffer::WritePageGuard,
        left_id: PageId,
        right_id: PageId,
        sep_slot: usize,
    ) -> Result<()> {
        let mut left_guard = self.bpm.fetch_write(left_id)?;
        let mut right_guard = self.bpm.fetch_write(right_id)?;
        let is_leaf = TreeNodeRef::new(left_guard.data()).is_leaf();
        debug!(
            index = %self.index_name,
            left = left_id.as_u32(),
            right = right_id.as_u32(),
            "merging siblings"
        );

        let moved_children = {
            let mut left = TreeNode::new(left_guard.data_mut());
            let mut right = TreeNode::new(right_guard.data_mut());

            if is_leaf {
                let moved = right.leaf_split_off(0);
                left.leaf_extend(&moved);
                left.set_next_page_id(right.next_page_id());
                Vec::new()
            } else {
                // The separator between the pair descends as the key of
                // the first moved slot.
                let sep = TreeNodeRef::new(parent_guard.data()).internal_key_at(sep_slot);
                let mut moved = right.internal_take_all();
                moved[0].0 = sep;
                left.internal_extend(&moved);
                moved.iter().map(|&(_, child)| child).collect()
            }
        };
        drop(right_guard);
        drop(left_guard);

        for child in moved_children {
            let mut guard = self.bpm.fetch_write(child)?;
            TreeNode::new(guard.data_mut()).set_parent_page_id(left_id);
        }

        self.bpm.delete_page(right_id)?;
        TreeNode::new(parent_guard.data_mut()).internal_remove_at(sep_slot);
        Ok(())
    }

    fn min_size_of(&self, is_leaf: bool) -> usize {
        if is_leaf {
            self.min_leaf_size()
        } else {
            self.min_internal_size()
        }
    }

    /// Writes the current root page id into the header page, inserting the
    /// record on the first change and updating it afterwards.
    fn sync_header(&self, root: &mut RootInfo) -> Result<()> {
        let mut guard = self.bpm.fetch_write(HEADER_PAGE_ID)?;
        let mut header = HeaderPage::new(guard.data_mut());
        if root.recorded {
            header.update_record(&self.index_name, root.page_id);
        } else {
            if !header.insert_record(&self.index_name, root.page_id)? {
                header.update_record(&self.index_name, root.page_id);
            }
            root.recorded = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SlotId;
    use crate::index::key_comparator::SignedIntComparator;
    use crate::storage::disk::DiskManager;
    use tempfile::TempDir;

    fn rid(n: u32) -> RecordId {
        RecordId::new(PageId::new(n), SlotId::new(n as u16))
    }

    fn create_tree(leaf_max: u32, internal_max: u32) -> (BPlusTree, TempDir) {
        let dir = TempDir::new().unwrap();
        let dm = Arc::new(DiskManager::new(dir.path().join("index.db")).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(64, 2, dm));
        let tree = BPlusTree::new(
            "test_index",
            bpm,
            Arc::new(SignedIntComparator),
            leaf_max,
            internal_max,
        )
        .unwrap();
        (tree, dir)
    }

    #[test]
    fn empty_tree_finds_nothing() {
        let (tree, _dir) = create_tree(4, 4);
        assert!(tree.is_empty());
        assert_eq!(tree.get_value(1).unwrap(), None);
        assert!(tree.begin().unwrap().is_end());
    }

    #[test]
    fn single_leaf_insert_and_lookup() {
        let (tree, _dir) = create_tree(4, 4);

        assert!(tree.insert(2, rid(2)).unwrap());
        assert!(tree.insert(1, rid(1)).unwrap());
        assert!(tree.insert(3, rid(3)).unwrap());
        // Duplicate is rejected.
        assert!(!tree.insert(2, rid(99)).unwrap());

        assert_eq!(tree.get_value(1).unwrap(), Some(rid(1)));
        assert_eq!(tree.get_value(2).unwrap(), Some(rid(2)));
        assert_eq!(tree.get_value(3).unwrap(), Some(rid(3)));
        assert_eq!(tree.get_value(4).unwrap(), None);
    }

    #[test]
    fn splits_preserve_lookups() {
        let (tree, _dir) = create_tree(4, 4);

        for key in 1..=50u32 {
            assert!(tree.insert(key, rid(key)).unwrap(), "insert {}", key);
        }
        for key in 1..=50u32 {
            assert_eq!(tree.get_value(key).unwrap(), Some(rid(key)), "find {}", key);
        }
        assert_eq!(tree.get_value(51).unwrap(), None);
    }

    #[test]
    fn scan_yields_sorted_keys() {
        let (tree, _dir) = create_tree(4, 4);

        let mut keys: Vec<u32> = (1..=40).collect();
        // Insert in a scrambled order.
        keys.reverse();
        for &key in &keys {
            tree.insert(key, rid(key)).unwrap();
        }

        let scanned: Vec<u32> = tree
            .begin()
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(scanned, (1..=40).collect::<Vec<_>>());
    }

    #[test]
    fn remove_to_empty_and_reuse() {
        let (tree, _dir) = create_tree(4, 4);

        for key in 1..=10u32 {
            tree.insert(key, rid(key)).unwrap();
        }
        for key in 1..=10u32 {
            tree.remove(key).unwrap();
        }
        assert!(tree.is_empty());
        assert_eq!(tree.get_value(5).unwrap(), None);

        tree.insert(42, rid(42)).unwrap();
        assert_eq!(tree.get_value(42).unwrap(), Some(rid(42)));
    }

    #[test]
    fn root_survives_reopen_via_header_page() {
        let dir = TempDir::new().unwrap();
        let dm = Arc::new(DiskManager::new(dir.path().join("reopen.db")).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(64, 2, dm));

        {
            let tree = BPlusTree::new(
                "idx",
                Arc::clone(&bpm),
                Arc::new(SignedIntComparator),
                4,
                4,
            )
            .unwrap();
            for key in 1..=20u32 {
                tree.insert(key, rid(key)).unwrap();
            }
        }

        let tree = BPlusTree::new("idx", bpm, Arc::new(SignedIntComparator), 4, 4).unwrap();
        assert!(!tree.is_empty());
        for key in 1..=20u32 {
            assert_eq!(tree.get_value(key).unwrap(), Some(rid(key)));
        }
    }
}
