pub mod config;
pub mod error;
pub mod transaction;
pub mod types;

pub use config::{
    DEFAULT_BUCKET_SIZE, DEFAULT_BUFFER_POOL_SIZE, DEFAULT_INTERNAL_MAX_SIZE, DEFAULT_LEAF_MAX_SIZE,
    DEFAULT_LRUK_K, HEADER_PAGE_ID, INVALID_FRAME_ID, INVALID_PAGE_ID, PAGE_SIZE,
};
pub use error::{Result, StrataError};
pub use transaction::Transaction;
pub use types::{FrameId, PageId, RecordId, SlotId, Timestamp};
