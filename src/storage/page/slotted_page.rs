use crate::common::{PageId, Result, SlotId, StrataError, PAGE_SIZE};

use super::codec::{get_u16, get_u32, put_u16, put_u32};

/// Slotted page layout:
///
/// +------------------+
/// | Page Header      |
/// +------------------+
/// | Slot Array       |  (grows downward)
/// +------------------+
/// | Free Space       |
/// +------------------+
/// | Tuple Data       |  (grows upward from the page end)
/// +------------------+
///
/// Each slot is (offset: u16, length: u16); length 0 marks a deleted slot.
pub(crate) const SLOTTED_HEADER_SIZE: usize = 16;
const SLOT_SIZE: usize = 4;

const PAGE_ID_OFFSET: usize = 0;
const NUM_SLOTS_OFFSET: usize = 4;
const FREE_SPACE_START_OFFSET: usize = 8;
const FREE_SPACE_END_OFFSET: usize = 12;

#[derive(Debug, Clone, Copy)]
pub struct SlotEntry {
    pub offset: u16,
    pub length: u16,
}

impl SlotEntry {
    pub fn new(offset: u16, length: u16) -> Self {
        Self { offset, length }
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Mutable view of a page interpreted as a slotted page.
pub struct SlottedPage<'a> {
    pub(crate) data: &'a mut [u8],
}

impl<'a> SlottedPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self, page_id: PageId) {
        self.data.fill(0);
        put_u32(self.data, PAGE_ID_OFFSET, page_id.as_u32());
        put_u32(self.data, NUM_SLOTS_OFFSET, 0);
        self.set_free_space_start(SLOTTED_HEADER_SIZE as u16);
        self.set_free_space_end(PAGE_SIZE as u16);
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(get_u32(self.data, PAGE_ID_OFFSET))
    }

    pub fn num_slots(&self) -> u16 {
        get_u32(self.data, NUM_SLOTS_OFFSET) as u16
    }

    fn set_num_slots(&mut self, num_slots: u16) {
        put_u32(self.data, NUM_SLOTS_OFFSET, num_slots as u32);
    }

    pub fn free_space_start(&self) -> u16 {
        get_u32(self.data, FREE_SPACE_START_OFFSET) as u16
    }

    pub(crate) fn set_free_space_start(&mut self, offset: u16) {
        put_u32(self.data, FREE_SPACE_START_OFFSET, offset as u32);
    }

    pub fn free_space_end(&self) -> u16 {
        get_u32(self.data, FREE_SPACE_END_OFFSET) as u16
    }

    fn set_free_space_end(&mut self, offset: u16) {
        put_u32(self.data, FREE_SPACE_END_OFFSET, offset as u32);
    }

    pub fn free_space(&self) -> usize {
        (self.free_space_end() as usize).saturating_sub(self.free_space_start() as usize)
    }

    /// Room for the tuple bytes plus a new slot entry.
    pub fn can_insert(&self, tuple_size: usize) -> bool {
        self.free_space() >= tuple_size + SLOT_SIZE
    }

    /// The slot array sits at the top of the used header area; its base is
    /// derived from free_space_start and the slot count.
    fn slot_array_base(&self) -> usize {
        (self.free_space_start() as usize).saturating_sub(self.num_slots() as usize * SLOT_SIZE)
    }

    pub fn get_slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        if slot_id.as_u16() >= self.num_slots() {
            return None;
        }
        let at = self.slot_array_base() + slot_id.as_u16() as usize * SLOT_SIZE;
        Some(SlotEntry::new(get_u16(self.data, at), get_u16(self.data, at + 2)))
    }

    fn set_slot(&mut self, slot_id: SlotId, entry: SlotEntry) {
        let at = self.slot_array_base() + slot_id.as_u16() as usize * SLOT_SIZE;
        put_u16(self.data, at, entry.offset);
        put_u16(self.data, at + 2, entry.length);
    }

    /// Inserts a tuple, reusing a deleted slot when one exists.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> Result<SlotId> {
        if !self.can_insert(tuple.len()) {
            return Err(StrataError::PageOverflow {
                tuple_size: tuple.len(),
                available: self.free_space().saturating_sub(SLOT_SIZE),
            });
        }

        let (slot_id, is_new_slot) = self.find_or_create_slot();
        if is_new_slot {
            // Grow the slot array before writing the entry so
            // slot_array_base accounts for it.
            self.set_free_space_start(self.free_space_start() + SLOT_SIZE as u16);
        }

        let tuple_offset = self.free_space_end() - tuple.len() as u16;
        self.data[tuple_offset as usize..tuple_offset as usize + tuple.len()]
            .copy_from_slice(tuple);
        self.set_slot(slot_id, SlotEntry::new(tuple_offset, tuple.len() as u16));
        self.set_free_space_end(tuple_offset);

        Ok(slot_id)
    }

    fn find_or_create_slot(&mut self) -> (SlotId, bool) {
        let num_slots = self.num_slots();
        for i in 0..num_slots {
            if self.get_slot(SlotId::new(i)).is_some_and(|e| e.is_empty()) {
                return (SlotId::new(i), false);
            }
        }
        self.set_num_slots(num_slots + 1);
        (SlotId::new(num_slots), true)
    }

    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        let entry = self
            .get_slot(slot_id)
            .ok_or(StrataError::InvalidSlotId(slot_id.as_u16()))?;
        if entry.is_empty() {
            return Err(StrataError::EmptySlot(slot_id.as_u16()));
        }
        Ok(&self.data[entry.offset as usize..entry.offset as usize + entry.length as usize])
    }

    /// Marks the slot deleted; the space is reclaimed by `compact`.
    pub fn delete_tuple(&mut self, slot_id: SlotId) -> Result<()> {
        if self.get_slot(slot_id).is_none() {
            return Err(StrataError::InvalidSlotId(slot_id.as_u16()));
        }
        self.set_slot(slot_id, SlotEntry::new(0, 0));
        Ok(())
    }

    /// Rewrites live tuples contiguously, reclaiming deleted space.
    pub fn compact(&mut self) {
        let num_slots = self.num_slots();
        if num_slots == 0 {
            return;
        }

        let mut live: Vec<(SlotId, Vec<u8>)> = Vec::new();
        for i in 0..num_slots {
            let slot_id = SlotId::new(i);
            if let Ok(tuple) = self.get_tuple(slot_id) {
                live.push((slot_id, tuple.to_vec()));
            }
        }

        self.set_free_space_end(PAGE_SIZE as u16);
        for i in 0..num_slots {
            self.set_slot(SlotId::new(i), SlotEntry::new(0, 0));
        }

        for (slot_id, tuple) in live {
            let tuple_offset = self.free_space_end() - tuple.len() as u16;
            self.data[tuple_offset as usize..tuple_offset as usize + tuple.len()]
                .copy_from_slice(&tuple);
            self.set_slot(slot_id, SlotEntry::new(tuple_offset, tuple.len() as u16));
            self.set_free_space_end(tuple_offset);
        }
    }

    pub fn tuple_count(&self) -> usize {
        (0..self.num_slots())
            .filter(|&i| self.get_slot(SlotId::new(i)).is_some_and(|e| !e.is_empty()))
            .count()
    }
}

/// Read-only view of a slotted page.
pub struct SlottedPageRef<'a> {
    pub(crate) data: &'a [u8],
}

impl<'a> SlottedPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(get_u32(self.data, PAGE_ID_OFFSET))
    }

    pub fn num_slots(&self) -> u16 {
        get_u32(self.data, NUM_SLOTS_OFFSET) as u16
    }

    fn slot_array_base(&self) -> usize {
        let start = get_u32(self.data, FREE_SPACE_START_OFFSET) as usize;
        start.saturating_sub(self.num_slots() as usize * SLOT_SIZE)
    }

    pub fn get_slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        if slot_id.as_u16() >= self.num_slots() {
            return None;
        }
        let at = self.slot_array_base() + slot_id.as_u16() as usize * SLOT_SIZE;
        Some(SlotEntry::new(get_u16(self.data, at), get_u16(self.data, at + 2)))
    }

    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        let entry = self
            .get_slot(slot_id)
            .ok_or(StrataError::InvalidSlotId(slot_id.as_u16()))?;
        if entry.is_empty() {
            return Err(StrataError::EmptySlot(slot_id.as_u16()));
        }
        Ok(&self.data[entry.offset as usize..entry.offset as usize + entry.length as usize])
    }

    pub fn tuple_count(&self) -> usize {
        (0..self.num_slots())
            .filter(|&i| self.get_slot(SlotId::new(i)).is_some_and(|e| !e.is_empty()))
            .count()
    }
}
