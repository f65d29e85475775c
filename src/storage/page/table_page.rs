use crate::common::{PageId, RecordId, Result, SlotId, INVALID_PAGE_ID};

use super::codec::{get_u32, put_u32};
use super::slotted_page::{SlottedPage, SlottedPageRef, SLOTTED_HEADER_SIZE};

/// Table page header fields, placed after the slotted page header:
///
/// | Field        | Offset | Size |
/// |--------------|--------|------|
/// | next_page_id | 16     | 4    |
/// | prev_page_id | 20     | 4    |
/// | table_id     | 24     | 4    |
///
/// Table pages of one heap form a doubly-linked list.
const NEXT_PAGE_ID_OFFSET: usize = SLOTTED_HEADER_SIZE;
const PREV_PAGE_ID_OFFSET: usize = SLOTTED_HEADER_SIZE + 4;
const TABLE_ID_OFFSET: usize = SLOTTED_HEADER_SIZE + 8;
const TABLE_HEADER_SIZE: usize = TABLE_ID_OFFSET + 4;

fn decode_link(raw: u32) -> Option<PageId> {
    if raw == INVALID_PAGE_ID.as_u32() {
        None
    } else {
        Some(PageId::new(raw))
    }
}

fn encode_link(page_id: Option<PageId>) -> u32 {
    page_id.map(|p| p.as_u32()).unwrap_or(INVALID_PAGE_ID.as_u32())
}

/// Mutable view of a heap table page: a slotted page plus sibling links.
pub struct TablePage<'a> {
    inner: SlottedPage<'a>,
}

impl<'a> TablePage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            inner: SlottedPage::new(data),
        }
    }

    pub fn init(&mut self, page_id: PageId, table_id: u32) {
        self.inner.init(page_id);
        // Reserve the extended header before the slot array starts.
        self.inner.set_free_space_start(TABLE_HEADER_SIZE as u16);
        self.set_next_page_id(None);
        self.set_prev_page_id(None);
        put_u32(self.inner.data, TABLE_ID_OFFSET, table_id);
    }

    pub fn page_id(&self) -> PageId {
        self.inner.page_id()
    }

    pub fn table_id(&self) -> u32 {
        get_u32(self.inner.data, TABLE_ID_OFFSET)
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        decode_link(get_u32(self.inner.data, NEXT_PAGE_ID_OFFSET))
    }

    pub fn set_next_page_id(&mut self, page_id: Option<PageId>) {
        put_u32(self.inner.data, NEXT_PAGE_ID_OFFSET, encode_link(page_id));
    }

    pub fn prev_page_id(&self) -> Option<PageId> {
        decode_link(get_u32(self.inner.data, PREV_PAGE_ID_OFFSET))
    }

    pub fn set_prev_page_id(&mut self, page_id: Option<PageId>) {
        put_u32(self.inner.data, PREV_PAGE_ID_OFFSET, encode_link(page_id));
    }

    pub fn insert_tuple(&mut self, tuple: &[u8]) -> Result<RecordId> {
        let slot_id = self.inner.insert_tuple(tuple)?;
        Ok(RecordId::new(self.page_id(), slot_id))
    }

    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        self.inner.get_tuple(slot_id)
    }

    pub fn delete_tuple(&mut self, slot_id: SlotId) -> Result<()> {
        self.inner.delete_tuple(slot_id)
    }

    pub fn can_insert(&self, tuple_size: usize) -> bool {
        self.inner.can_insert(tuple_size)
    }

    pub fn free_space(&self) -> usize {
        self.inner.free_space()
    }

    pub fn tuple_count(&self) -> usize {
        self.inner.tuple_count()
    }
}

/// Read-only view of a heap table page.
pub struct TablePageRef<'a> {
    inner: SlottedPageRef<'a>,
}

impl<'a> TablePageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            inner: SlottedPageRef::new(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.inner.page_id()
    }

    pub fn table_id(&self) -> u32 {
        get_u32(self.inner.data, TABLE_ID_OFFSET)
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        decode_link(get_u32(self.inner.data, NEXT_PAGE_ID_OFFSET))
    }

    pub fn prev_page_id(&self) -> Option<PageId> {
        decode_link(get_u32(self.inner.data, PREV_PAGE_ID_OFFSET))
    }

    pub fn num_slots(&self) -> u16 {
        self.inner.num_slots()
    }

    /// Returns the tuple at `slot_id`, or None for a deleted slot.
    pub fn tuple_if_live(&self, slot_id: SlotId) -> Option<&[u8]> {
        self.inner.get_tuple(slot_id).ok()
    }

    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        self.inner.get_tuple(slot_id)
    }

    pub fn tuple_count(&self) -> usize {
        self.inner.tuple_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PAGE_SIZE;

    #[test]
    fn init_and_links() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = TablePage::new(&mut data);
        page.init(PageId::new(2), 7);

        assert_eq!(page.page_id(), PageId::new(2));
        assert_eq!(page.table_id(), 7);
        assert_eq!(page.next_page_id(), None);
        assert_eq!(page.prev_page_id(), None);

        page.set_next_page_id(Some(PageId::new(5)));
        page.set_prev_page_id(Some(PageId::new(3)));
        assert_eq!(page.next_page_id(), Some(PageId::new(5)));
        assert_eq!(page.prev_page_id(), Some(PageId::new(3)));
    }

    #[test]
    fn insert_returns_record_id() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = TablePage::new(&mut data);
        page.init(PageId::new(2), 1);

        let rid = page.insert_tuple(b"hello").unwrap();
        assert_eq!(rid.page_id, PageId::new(2));
        assert_eq!(page.get_tuple(rid.slot_id).unwrap(), b"hello");
    }

    #[test]
    fn readonly_view_skips_deleted() {
        let mut data = [0u8; PAGE_SIZE];
        let (rid0, rid1) = {
            let mut page = TablePage::new(&mut data);
            page.init(PageId::new(2), 1);
            let rid0 = page.insert_tuple(b"a").unwrap();
            let rid1 = page.insert_tuple(b"b").unwrap();
            page.delete_tuple(rid0.slot_id).unwrap();
            (rid0, rid1)
        };

        let view = TablePageRef::new(&data);
        assert!(view.tuple_if_live(rid0.slot_id).is_none());
        assert_eq!(view.tuple_if_live(rid1.slot_id), Some(b"b".as_slice()));
        assert_eq!(view.tuple_count(), 1);
    }
}
