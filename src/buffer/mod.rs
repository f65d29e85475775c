mod buffer_pool;
mod frame;
mod lru_k_replacer;
mod page_guard;

pub use buffer_pool::BufferPoolManager;
pub use frame::Frame;
pub use lru_k_replacer::LruKReplacer;
pub use page_guard::{ReadPageGuard, WritePageGuard};
