//! Strata - the storage and execution core of a teaching relational
//! database.
//!
//! The crate turns a fixed pool of in-memory page frames backed by a
//! block device into the structures a query executor needs:
//!
//! - **Buffer Pool** (`buffer`): owns every page frame, enforces
//!   pin/dirty/evict invariants, and lends pages out through RAII guards.
//!   Frame replacement follows an LRU-K policy.
//! - **Extendible Hash Table** (`container`): an associative container
//!   with dynamic directory doubling, doubling as the buffer pool's
//!   `page_id -> frame_id` directory.
//! - **B+ Tree Index** (`index`): a disk-resident ordered map whose nodes
//!   are buffer pool pages, with linked leaves for range scans.
//! - **Execution engine** (`execution`, `optimizer`, `catalog`):
//!   pull-based operators (scans, joins, insert/delete, sort/limit/top-n)
//!   over heap tables and indexes, plus the sort+limit -> top-n plan
//!   rewrite.
//! - **Storage layer** (`storage`): single-file disk manager, a
//!   background I/O scheduler, slotted heap pages and the index header
//!   page.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::buffer::BufferPoolManager;
//! use strata::storage::disk::DiskManager;
//!
//! let disk = Arc::new(DiskManager::new("demo.db").unwrap());
//! let pool = BufferPoolManager::new(64, 2, disk);
//!
//! let page_id = {
//!     let mut guard = pool.new_page().unwrap();
//!     guard.data_mut()[0] = 42;
//!     guard.page_id()
//! }; // dropping the guard unpins the page
//!
//! let guard = pool.fetch_read(page_id).unwrap();
//! assert_eq!(guard.data()[0], 42);
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod container;
pub mod execution;
pub mod index;
pub mod optimizer;
pub mod storage;
pub mod tuple;

pub use common::{PageId, RecordId, Result, SlotId, StrataError, Transaction};
