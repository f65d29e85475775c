use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result, Transaction};
use crate::storage::page::{TablePage, TablePageRef};

use super::TableIterator;

/// A heap table: an unordered collection of tuples stored across a
/// doubly-linked list of table pages, addressed by record id.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    table_id: u32,
    first_page_id: PageId,
    /// Insertion cursor: the tail of the page list
    last_page_id: Mutex<PageId>,
}

impl TableHeap {
    /// Creates a heap with one empty page.
    pub fn new(bpm: Arc<BufferPoolManager>, table_id: u32) -> Result<Self> {
        let first_page_id = {
            let mut guard = bpm.new_page()?;
            let page_id = guard.page_id();
            let mut page = TablePage::new(guard.data_mut());
            page.init(page_id, table_id);
            page_id
        };

        Ok(Self {
            bpm,
            table_id,
            first_page_id,
            last_page_id: Mutex::new(first_page_id),
        })
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Appends a tuple, growing the page list when the tail is full.
    pub fn insert_tuple(&self, data: &[u8], _txn: &Transaction) -> Result<RecordId> {
        let mut last = self.last_page_id.lock();

        {
            let mut guard = self.bpm.fetch_write(*last)?;
            let mut page = TablePage::new(guard.data_mut());
            if page.can_insert(data.len()) {
                return page.insert_tuple(data);
            }
        }

        // Tail is full: allocate, link, retry there.
        let mut new_guard = self.bpm.new_page()?;
        let new_page_id = new_guard.page_id();
        {
            let mut page = TablePage::new(new_guard.data_mut());
            page.init(new_page_id, self.table_id);
            page.set_prev_page_id(Some(*last));
        }

        {
            let mut old_guard = self.bpm.fetch_write(*last)?;
            let mut old_page = TablePage::new(old_guard.data_mut());
            old_page.set_next_page_id(Some(new_page_id));
        }

        *last = new_page_id;
        let mut page = TablePage::new(new_guard.data_mut());
        page.insert_tuple(data)
    }

    /// Marks the tuple at `rid` deleted. Returns false when the slot is
    /// already empty or out of range.
    pub fn mark_delete(&self, rid: RecordId, _txn: &Transaction) -> Result<bool> {
        let mut guard = self.bpm.fetch_write(rid.page_id)?;
        let mut page = TablePage::new(guard.data_mut());
        if page.get_tuple(rid.slot_id).is_err() {
            return Ok(false);
        }
        page.delete_tuple(rid.slot_id)?;
        Ok(true)
    }

    /// Fetches the tuple bytes at `rid`, or None if it has been deleted.
    pub fn get_tuple(&self, rid: RecordId, _txn: &Transaction) -> Result<Option<Vec<u8>>> {
        let guard = self.bpm.fetch_read(rid.page_id)?;
        let page = TablePageRef::new(guard.data());
        Ok(page.tuple_if_live(rid.slot_id).map(|t| t.to_vec()))
    }

    /// Cursor over all live tuples in (page, slot) order.
    pub fn iter(&self, _txn: &Transaction) -> TableIterator {
        TableIterator::new(Arc::clone(&self.bpm), self.first_page_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::DiskManager;
    use tempfile::TempDir;

    fn create_heap() -> (TableHeap, Arc<BufferPoolManager>, TempDir) {
        let dir = TempDir::new().unwrap();
        let dm = Arc::new(DiskManager::new(dir.path().join("heap.db")).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(16, 2, dm));
        let heap = TableHeap::new(Arc::clone(&bpm), 1).unwrap();
        (heap, bpm, dir)
    }

    #[test]
    fn insert_and_fetch() {
        let (heap, _bpm, _dir) = create_heap();
        let txn = Transaction::new();

        let rid = heap.insert_tuple(b"hello", &txn).unwrap();
        assert_eq!(heap.get_tuple(rid, &txn).unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn delete_hides_tuple() {
        let (heap, _bpm, _dir) = create_heap();
        let txn = Transaction::new();

        let rid = heap.insert_tuple(b"row", &txn).unwrap();
        assert!(heap.mark_delete(rid, &txn).unwrap());
        assert!(!heap.mark_delete(rid, &txn).unwrap());
        assert_eq!(heap.get_tuple(rid, &txn).unwrap(), None);
    }

    #[test]
    fn spills_to_linked_pages() {
        let (heap, _bpm, _dir) = create_heap();
        let txn = Transaction::new();

        // Each row takes ~1KB, so a handful of inserts cross a page
        // boundary.
        let row = [7u8; 1000];
        let rids: Vec<_> = (0..10)
            .map(|_| heap.insert_tuple(&row, &txn).unwrap())
            .collect();

        let pages: std::collections::HashSet<_> = rids.iter().map(|r| r.page_id).collect();
        assert!(pages.len() > 1);

        for rid in rids {
            assert_eq!(heap.get_tuple(rid, &txn).unwrap(), Some(row.to_vec()));
        }
    }

    #[test]
    fn iterates_in_insertion_order() {
        let (heap, _bpm, _dir) = create_heap();
        let txn = Transaction::new();

        let rows: Vec<Vec<u8>> = (0..100u8).map(|i| vec![i; 40]).collect();
        for row in &rows {
            heap.insert_tuple(row, &txn).unwrap();
        }

        let scanned: Vec<Vec<u8>> = heap
            .iter(&txn)
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(scanned, rows);
    }

    #[test]
    fn iterator_skips_deleted() {
        let (heap, _bpm, _dir) = create_heap();
        let txn = Transaction::new();

        let r0 = heap.insert_tuple(b"a", &txn).unwrap();
        let _r1 = heap.insert_tuple(b"b", &txn).unwrap();
        let r2 = heap.insert_tuple(b"c", &txn).unwrap();
        heap.mark_delete(r0, &txn).unwrap();
        heap.mark_delete(r2, &txn).unwrap();

        let scanned: Vec<Vec<u8>> = heap.iter(&txn).map(|r| r.unwrap().1).collect();
        assert_eq!(scanned, vec![b"b".to_vec()]);
    }
}
