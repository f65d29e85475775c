use std::collections::LinkedList;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::{FrameId, PageId, Result, StrataError, INVALID_PAGE_ID, PAGE_SIZE};
use crate::container::ExtendibleHashTable;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{Frame, LruKReplacer, ReadPageGuard, WritePageGuard};

/// State shared between the pool and the release callbacks of outstanding
/// page guards.
struct BufferPoolState {
    frames: Vec<Arc<Frame>>,
    /// page_id -> frame_id directory; the extendible hash table's own
    /// mutex serializes directory operations
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// Frames not bound to any page. A frame is here xor in the page table.
    free_list: Mutex<LinkedList<FrameId>>,
    replacer: LruKReplacer,
}

impl BufferPoolState {
    /// Decrements a resident page's pin count, ORing in the dirty flag.
    /// Returns false for unknown pages and for pin counts already at zero.
    fn unpin(&self, page_id: PageId, dirty: bool) -> bool {
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        if dirty {
            frame.mark_dirty();
        }
        match frame.unpin() {
            Some(0) => {
                let _ = self.replacer.set_evictable(frame_id, true);
                true
            }
            Some(_) => true,
            None => false,
        }
    }
}

/// BufferPoolManager owns every in-memory page frame and is the sole
/// mediator of disk I/O. Pages are lent out through RAII guards that pin
/// the frame for their lifetime and unpin it (carrying a sticky dirty
/// flag) on drop.
pub struct BufferPoolManager {
    pool_size: usize,
    state: Arc<BufferPoolState>,
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a pool with `pool_size` frames using LRU-`k` replacement,
    /// with every frame initially on the free list.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();
        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Frame::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(BufferPoolState {
            frames,
            page_table: ExtendibleHashTable::new(crate::common::DEFAULT_BUCKET_SIZE),
            free_list: Mutex::new(free_list),
            replacer: LruKReplacer::new(k, pool_size),
        });

        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page and returns it pinned for writing.
    /// Fails with `BufferPoolFull` when every frame is pinned.
    pub fn new_page(&self) -> Result<WritePageGuard> {
        let frame_id = self.acquire_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let page_id = self.disk_scheduler.disk_manager().allocate_page()?;

        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();

        self.state.page_table.insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id)?;
        self.state.replacer.set_evictable(frame_id, false)?;

        trace!(page_id = page_id.as_u32(), frame_id = frame_id.as_u32(), "new page");
        Ok(self.make_write_guard(page_id, frame_id))
    }

    /// Pins a page for shared read access, loading it from disk on a miss.
    pub fn fetch_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame_id = self.pin_page(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        let state = Arc::clone(&self.state);
        let guard = unsafe {
            ReadPageGuard::new(
                page_id,
                frame,
                Box::new(move |pid, dirty| {
                    state.unpin(pid, dirty);
                }),
            )
        };
        Ok(guard)
    }

    /// Pins a page for exclusive write access, loading it from disk on a
    /// miss.
    pub fn fetch_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame_id = self.pin_page(page_id)?;
        Ok(self.make_write_guard(page_id, frame_id))
    }

    /// Decrements a page's pin count. The dirty flag is sticky: once a
    /// frame is marked dirty it stays dirty until flushed or evicted.
    /// Returns false for non-resident pages and double unpins.
    pub fn unpin_page(&self, page_id: PageId, dirty: bool) -> bool {
        self.state.unpin(page_id, dirty)
    }

    /// Writes a resident page to disk and clears its dirty flag. Pin state
    /// is untouched. Returns false when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(StrataError::InvalidPageId(page_id));
        }

        let Some(frame_id) = self.state.page_table.find(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        frame.snapshot(&mut data);
        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.clear_dirty();
        Ok(true)
    }

    /// Flushes every resident page. Clean frames already match the disk
    /// and are skipped, which makes back-to-back flushes a no-op.
    pub fn flush_all_pages(&self) -> Result<()> {
        for (page_id, frame_id) in self.state.page_table.entries() {
            let frame = &self.state.frames[frame_id.as_usize()];
            if !frame.is_dirty() {
                continue;
            }
            let mut data = [0u8; PAGE_SIZE];
            frame.snapshot(&mut data);
            self.disk_scheduler.schedule_write_sync(page_id, &data)?;
            frame.clear_dirty();
        }
        Ok(())
    }

    /// Drops a page from the pool and deallocates it on disk.
    /// Fails while the page is pinned; returns false when not resident.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let Some(frame_id) = self.state.page_table.find(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            return Err(StrataError::PageStillPinned(page_id));
        }

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.snapshot(&mut data);
            self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        }

        self.state.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id)?;
        frame.reset();
        self.state.free_list.lock().push_back(frame_id);

        self.disk_scheduler.disk_manager().deallocate_page(page_id);
        Ok(true)
    }

    /// Pin count of a resident page, None otherwise.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        self.state
            .page_table
            .find(&page_id)
            .map(|frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.free_list.lock().len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    fn make_write_guard(&self, page_id: PageId, frame_id: FrameId) -> WritePageGuard {
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        let state = Arc::clone(&self.state);
        unsafe {
            WritePageGuard::new(
                page_id,
                frame,
                Box::new(move |pid, dirty| {
                    state.unpin(pid, dirty);
                }),
            )
        }
    }

    /// Pins the frame holding `page_id`, reading the page from disk only
    /// when it is not already resident.
    fn pin_page(&self, page_id: PageId) -> Result<FrameId> {
        if page_id == INVALID_PAGE_ID {
            return Err(StrataError::InvalidPageId(page_id));
        }

        if let Some(frame_id) = self.state.page_table.find(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.record_access(frame_id)?;
            self.state.replacer.set_evictable(frame_id, false)?;
            return Ok(frame_id);
        }

        // Miss: the disk read happens only on this branch.
        let frame_id = self.acquire_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        self.disk_scheduler.schedule_read_sync(page_id, &mut data)?;

        frame.set_page_id(page_id);
        frame.load(&data);
        frame.clear_dirty();
        frame.pin();

        self.state.page_table.insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id)?;
        self.state.replacer.set_evictable(frame_id, false)?;

        trace!(page_id = page_id.as_u32(), frame_id = frame_id.as_u32(), "fetch miss");
        Ok(frame_id)
    }

    /// Obtains an unbound frame from the free list, evicting (and flushing
    /// a dirty victim) when none is free.
    fn acquire_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.state.free_list.lock().pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.state.replacer.evict() else {
            return Err(StrataError::BufferPoolFull);
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.snapshot(&mut data);
            self.disk_scheduler.schedule_write_sync(old_page_id, &data)?;
        }
        debug!(
            victim = old_page_id.as_u32(),
            frame_id = frame_id.as_u32(),
            "evicting page"
        );

        self.state.page_table.remove(&old_page_id);
        frame.reset();
        Ok(frame_id)
    }
}
