mod delete;
mod executor;
mod expression;
mod index_scan;
mod insert;
mod limit;
mod nested_index_join;
mod nested_loop_join;
mod plan;
mod seq_scan;
mod sort;
mod topn;
mod values;

use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::catalog::Catalog;
use crate::common::Transaction;

pub use delete::DeleteExecutor;
pub use executor::{create_executor, Executor};
pub use expression::{value_is_true, ComparisonOp, Expression};
pub use index_scan::IndexScanExecutor;
pub use insert::InsertExecutor;
pub use limit::LimitExecutor;
pub use nested_index_join::NestedIndexJoinExecutor;
pub use nested_loop_join::NestedLoopJoinExecutor;
pub use plan::{JoinType, OrderBy, PlanNode};
pub use seq_scan::SeqScanExecutor;
pub use sort::SortExecutor;
pub use topn::TopNExecutor;
pub use values::ValuesExecutor;

/// Everything an executor needs from its surroundings.
pub struct ExecutorContext {
    pub catalog: Arc<Catalog>,
    pub bpm: Arc<BufferPoolManager>,
    pub txn: Arc<Transaction>,
}

impl ExecutorContext {
    pub fn new(catalog: Arc<Catalog>, bpm: Arc<BufferPoolManager>, txn: Arc<Transaction>) -> Self {
        Self { catalog, bpm, txn }
    }
}
