use std::sync::Arc;

use crate::catalog::{IndexOid, TableOid};
use crate::tuple::{Schema, Value};

use super::expression::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

/// One sort key; `desc` flips the order.
#[derive(Clone)]
pub struct OrderBy {
    pub expr: Expression,
    pub desc: bool,
}

impl OrderBy {
    pub fn asc(expr: Expression) -> Self {
        Self { expr, desc: false }
    }

    pub fn desc(expr: Expression) -> Self {
        Self { expr, desc: true }
    }
}

/// Physical plan tree. Each node owns its children exclusively; executors
/// are built from it by `create_executor`.
#[derive(Clone)]
pub enum PlanNode {
    SeqScan {
        table_oid: TableOid,
    },
    IndexScan {
        index_oid: IndexOid,
    },
    NestedLoopJoin {
        join_type: JoinType,
        predicate: Expression,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    NestedIndexJoin {
        join_type: JoinType,
        key_expr: Expression,
        index_oid: IndexOid,
        child: Box<PlanNode>,
    },
    Insert {
        table_oid: TableOid,
        child: Box<PlanNode>,
    },
    Delete {
        table_oid: TableOid,
        child: Box<PlanNode>,
    },
    Values {
        schema: Arc<Schema>,
        rows: Vec<Vec<Value>>,
    },
    Limit {
        limit: usize,
        child: Box<PlanNode>,
    },
    Sort {
        order_bys: Vec<OrderBy>,
        child: Box<PlanNode>,
    },
    TopN {
        order_bys: Vec<OrderBy>,
        n: usize,
        child: Box<PlanNode>,
    },
}
