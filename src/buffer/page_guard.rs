use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::Frame;

/// Callback invoked when a guard releases its page: (page_id, dirtied)
type ReleaseCallback = Box<dyn FnOnce(PageId, bool) + Send + Sync>;

/// Shared guard plumbing: keeps the frame alive and fires the release
/// callback exactly once on drop.
struct GuardCore {
    page_id: PageId,
    /// Kept alive for the guard's lifetime; the data lock guard borrows it
    _frame: Arc<Frame>,
    release: Option<ReleaseCallback>,
    dirtied: bool,
}

impl GuardCore {
    fn new(page_id: PageId, frame: Arc<Frame>, release: ReleaseCallback) -> Self {
        Self {
            page_id,
            _frame: frame,
            release: Some(release),
            dirtied: false,
        }
    }

    fn release(&mut self) {
        if let Some(callback) = self.release.take() {
            callback(self.page_id, self.dirtied);
        }
    }
}

/// RAII guard lending read access to a pinned page.
/// Unpins the page when dropped.
pub struct ReadPageGuard {
    core: GuardCore,
    _data: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>,
}

impl ReadPageGuard {
    /// # Safety
    /// The caller must ensure the frame outlives the guard; the Arc held in
    /// `core` guarantees this, which is what makes the lifetime transmute
    /// sound.
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<Frame>,
        release: ReleaseCallback,
    ) -> Self {
        let data = frame.data.read();
        let data: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> = std::mem::transmute(data);
        Self {
            core: GuardCore::new(page_id, frame, release),
            _data: data,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.core.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self._data[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.core.release();
    }
}

/// RAII guard lending exclusive access to a pinned page.
/// Marks the page dirty on first mutable access and unpins it when dropped.
pub struct WritePageGuard {
    core: GuardCore,
    data: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl WritePageGuard {
    /// # Safety
    /// Same contract as [`ReadPageGuard::new`].
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<Frame>,
        release: ReleaseCallback,
    ) -> Self {
        let data = frame.data.write();
        let data: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> = std::mem::transmute(data);
        Self {
            core: GuardCore::new(page_id, frame, release),
            data: Some(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.core.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().unwrap()[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.core.dirtied = true;
        &mut self.data.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // The data lock must release before the pool observes the unpin.
        self.data.take();
        self.core.release();
    }
}
