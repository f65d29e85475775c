use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::tuple::{Schema, Tuple};

use super::plan::PlanNode;
use super::{
    DeleteExecutor, ExecutorContext, IndexScanExecutor, InsertExecutor, LimitExecutor,
    NestedIndexJoinExecutor, NestedLoopJoinExecutor, SeqScanExecutor, SortExecutor, TopNExecutor,
    ValuesExecutor,
};

/// Pull-based iterator interface implemented by every operator.
///
/// `init` is idempotent per run and (re)positions the operator at its
/// start; `next` yields one row at a time and None at end of stream.
pub trait Executor {
    fn init(&mut self) -> Result<()>;

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>>;

    fn output_schema(&self) -> Arc<Schema>;
}

/// Builds the executor tree for a physical plan. Join operators reject
/// unsupported join types here, at construction.
pub fn create_executor(ctx: &Arc<ExecutorContext>, plan: &PlanNode) -> Result<Box<dyn Executor>> {
    match plan {
        PlanNode::SeqScan { table_oid } => {
            Ok(Box::new(SeqScanExecutor::new(Arc::clone(ctx), *table_oid)?))
        }
        PlanNode::IndexScan { index_oid } => {
            Ok(Box::new(IndexScanExecutor::new(Arc::clone(ctx), *index_oid)?))
        }
        PlanNode::NestedLoopJoin {
            join_type,
            predicate,
            left,
            right,
        } => {
            let left = create_executor(ctx, left)?;
            let right = create_executor(ctx, right)?;
            Ok(Box::new(NestedLoopJoinExecutor::new(
                *join_type,
                predicate.clone(),
                left,
                right,
            )?))
        }
        PlanNode::NestedIndexJoin {
            join_type,
            key_expr,
            index_oid,
            child,
        } => {
            let child = create_executor(ctx, child)?;
            Ok(Box::new(NestedIndexJoinExecutor::new(
                Arc::clone(ctx),
                *join_type,
                key_expr.clone(),
                *index_oid,
                child,
            )?))
        }
        PlanNode::Insert { table_oid, child } => {
            let child = create_executor(ctx, child)?;
            Ok(Box::new(InsertExecutor::new(
                Arc::clone(ctx),
                *table_oid,
                child,
            )?))
        }
        PlanNode::Delete { table_oid, child } => {
            let child = create_executor(ctx, child)?;
            Ok(Box::new(DeleteExecutor::new(
                Arc::clone(ctx),
                *table_oid,
                child,
            )?))
        }
        PlanNode::Values { schema, rows } => Ok(Box::new(ValuesExecutor::new(
            Arc::clone(schema),
            rows.clone(),
        ))),
        PlanNode::Limit { limit, child } => {
            let child = create_executor(ctx, child)?;
            Ok(Box::new(LimitExecutor::new(*limit, child)))
        }
        PlanNode::Sort { order_bys, child } => {
            let child = create_executor(ctx, child)?;
            Ok(Box::new(SortExecutor::new(order_bys.clone(), child)))
        }
        PlanNode::TopN {
            order_bys,
            n,
            child,
        } => {
            let child = create_executor(ctx, child)?;
            Ok(Box::new(TopNExecutor::new(order_bys.clone(), *n, child)))
        }
    }
}
