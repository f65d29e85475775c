use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result, SlotId};
use crate::storage::page::TablePageRef;

/// Cursor over a heap's live tuples in (page, slot) order.
///
/// The cursor pins each page only while scanning it, so a long scan never
/// holds more than one frame.
pub struct TableIterator {
    bpm: Arc<BufferPoolManager>,
    current_page_id: Option<PageId>,
    next_slot: u16,
}

impl TableIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, first_page_id: PageId) -> Self {
        Self {
            bpm,
            current_page_id: Some(first_page_id),
            next_slot: 0,
        }
    }

    pub fn advance(&mut self) -> Result<Option<(RecordId, Vec<u8>)>> {
        while let Some(page_id) = self.current_page_id {
            let next_page = {
                let guard = self.bpm.fetch_read(page_id)?;
                let page = TablePageRef::new(guard.data());

                while self.next_slot < page.num_slots() {
                    let slot_id = SlotId::new(self.next_slot);
                    self.next_slot += 1;
                    if let Some(tuple) = page.tuple_if_live(slot_id) {
                        return Ok(Some((RecordId::new(page_id, slot_id), tuple.to_vec())));
                    }
                }
                page.next_page_id()
            };

            self.current_page_id = next_page;
            self.next_slot = 0;
        }
        Ok(None)
    }
}

impl Iterator for TableIterator {
    type Item = Result<(RecordId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
