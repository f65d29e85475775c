use crate::common::{PageId, Result, StrataError, PAGE_SIZE};

use super::codec::{get_u32, put_u32};

/// Index header page, always page 0.
///
/// Records which page is the root of each named index, so trees can be
/// reopened after a restart. Layout: record count (u32) followed by
/// fixed-width records of a nul-padded name and the root page id.
const NUM_RECORDS_OFFSET: usize = 0;
const RECORDS_OFFSET: usize = 4;
const NAME_SIZE: usize = 32;
const RECORD_SIZE: usize = NAME_SIZE + 4;
const MAX_RECORDS: usize = (PAGE_SIZE - RECORDS_OFFSET) / RECORD_SIZE;

fn record_offset(index: usize) -> usize {
    RECORDS_OFFSET + index * RECORD_SIZE
}

fn name_at(data: &[u8], index: usize) -> &[u8] {
    let at = record_offset(index);
    let raw = &data[at..at + NAME_SIZE];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
    &raw[..end]
}

fn find_record(data: &[u8], name: &str) -> Option<usize> {
    let count = get_u32(data, NUM_RECORDS_OFFSET) as usize;
    (0..count).find(|&i| name_at(data, i) == name.as_bytes())
}

/// Mutable view of the header page.
pub struct HeaderPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self) {
        self.data.fill(0);
    }

    pub fn num_records(&self) -> usize {
        get_u32(self.data, NUM_RECORDS_OFFSET) as usize
    }

    /// Adds a (name, root) record. Returns false when the name already
    /// exists.
    pub fn insert_record(&mut self, name: &str, root_page_id: PageId) -> Result<bool> {
        if name.len() > NAME_SIZE {
            return Err(StrataError::IndexNameTooLong(name.to_string()));
        }
        if find_record(self.data, name).is_some() {
            return Ok(false);
        }

        let count = self.num_records();
        if count >= MAX_RECORDS {
            return Err(StrataError::HeaderPageFull);
        }

        let at = record_offset(count);
        self.data[at..at + NAME_SIZE].fill(0);
        self.data[at..at + name.len()].copy_from_slice(name.as_bytes());
        put_u32(self.data, at + NAME_SIZE, root_page_id.as_u32());
        put_u32(self.data, NUM_RECORDS_OFFSET, (count + 1) as u32);
        Ok(true)
    }

    /// Rewrites the root for an existing record. Returns false when the
    /// name is unknown.
    pub fn update_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        match find_record(self.data, name) {
            Some(i) => {
                put_u32(self.data, record_offset(i) + NAME_SIZE, root_page_id.as_u32());
                true
            }
            None => false,
        }
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        find_record(self.data, name)
            .map(|i| PageId::new(get_u32(self.data, record_offset(i) + NAME_SIZE)))
    }
}

/// Read-only view of the header page.
pub struct HeaderPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn num_records(&self) -> usize {
        get_u32(self.data, NUM_RECORDS_OFFSET) as usize
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        find_record(self.data, name)
            .map(|i| PageId::new(get_u32(self.data, record_offset(i) + NAME_SIZE)))
    }
}
