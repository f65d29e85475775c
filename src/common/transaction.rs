use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(0);

/// Transaction handle threaded through the execution engine.
///
/// Concurrency-control semantics live in the (external) transaction and
/// lock managers; the storage layer only carries the handle.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            id: NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}
