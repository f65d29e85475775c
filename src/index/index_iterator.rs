use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result, INVALID_PAGE_ID};

use super::key_comparator::IndexKey;
use super::tree_page::TreeNodeRef;

/// Range cursor over the tree's linked leaves.
///
/// The cursor is a `(leaf_page_id, slot)` pair; it pins the current leaf
/// only for the duration of each step and follows `next_page_id` past the
/// last slot. An iterator whose leaf is INVALID_PAGE_ID is the end
/// iterator, and all end iterators compare equal.
pub struct IndexIterator {
    bpm: Arc<BufferPoolManager>,
    leaf_page_id: PageId,
    slot: usize,
}

impl IndexIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, leaf_page_id: PageId, slot: usize) -> Self {
        Self {
            bpm,
            leaf_page_id,
            slot,
        }
    }

    pub(crate) fn end(bpm: Arc<BufferPoolManager>) -> Self {
        Self::new(bpm, INVALID_PAGE_ID, 0)
    }

    pub fn is_end(&self) -> bool {
        self.leaf_page_id == INVALID_PAGE_ID
    }

    /// Yields the entry under the cursor and advances, crossing into the
    /// next leaf when the current one is exhausted.
    pub fn advance(&mut self) -> Result<Option<(IndexKey, RecordId)>> {
        while self.leaf_page_id != INVALID_PAGE_ID {
            let guard = self.bpm.fetch_read(self.leaf_page_id)?;
            let node = TreeNodeRef::new(guard.data());

            if self.slot < node.size() {
                let entry = (node.leaf_key_at(self.slot), node.leaf_rid_at(self.slot));
                self.slot += 1;
                return Ok(Some(entry));
            }
            self.leaf_page_id = node.next_page_id();
            self.slot = 0;
        }
        Ok(None)
    }
}

impl PartialEq for IndexIterator {
    fn eq(&self, other: &Self) -> bool {
        if self.is_end() && other.is_end() {
            return true;
        }
        self.leaf_page_id == other.leaf_page_id && self.slot == other.slot
    }
}

impl Iterator for IndexIterator {
    type Item = Result<(IndexKey, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
