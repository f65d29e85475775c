//! Structural plan rewrites applied before execution.

use crate::execution::PlanNode;

/// Rewrites every `Limit(k)` directly over a `Sort` into a single `TopN`
/// node over the sort's child. The walk is bottom-up, so the pattern is
/// recognized anywhere in the tree; the rewrite is purely structural and
/// preserves the outer limit's output schema (both nodes pass their
/// child's schema through).
pub fn optimize_sort_limit_as_topn(plan: PlanNode) -> PlanNode {
    let plan = rewrite_children(plan, optimize_sort_limit_as_topn);

    match plan {
        PlanNode::Limit { limit, child } => match *child {
            PlanNode::Sort { order_bys, child } => PlanNode::TopN {
                order_bys,
                n: limit,
                child,
            },
            other => PlanNode::Limit {
                limit,
                child: Box::new(other),
            },
        },
        other => other,
    }
}

fn rewrite_children(plan: PlanNode, f: fn(PlanNode) -> PlanNode) -> PlanNode {
    match plan {
        PlanNode::NestedLoopJoin {
            join_type,
            predicate,
            left,
            right,
        } => PlanNode::NestedLoopJoin {
            join_type,
            predicate,
            left: Box::new(f(*left)),
            right: Box::new(f(*right)),
        },
        PlanNode::NestedIndexJoin {
            join_type,
            key_expr,
            index_oid,
            child,
        } => PlanNode::NestedIndexJoin {
            join_type,
            key_expr,
            index_oid,
            child: Box::new(f(*child)),
        },
        PlanNode::Insert { table_oid, child } => PlanNode::Insert {
            table_oid,
            child: Box::new(f(*child)),
        },
        PlanNode::Delete { table_oid, child } => PlanNode::Delete {
            table_oid,
            child: Box::new(f(*child)),
        },
        PlanNode::Limit { limit, child } => PlanNode::Limit {
            limit,
            child: Box::new(f(*child)),
        },
        PlanNode::Sort { order_bys, child } => PlanNode::Sort {
            order_bys,
            child: Box::new(f(*child)),
        },
        PlanNode::TopN {
            order_bys,
            n,
            child,
        } => PlanNode::TopN {
            order_bys,
            n,
            child: Box::new(f(*child)),
        },
        leaf @ (PlanNode::SeqScan { .. } | PlanNode::IndexScan { .. } | PlanNode::Values { .. }) => {
            leaf
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Expression, OrderBy};
    use crate::tuple::{DataType, Schema};

    fn values_leaf() -> PlanNode {
        PlanNode::Values {
            schema: Schema::builder().column("x", DataType::Integer).build_arc(),
            rows: Vec::new(),
        }
    }

    #[test]
    fn limit_over_sort_becomes_topn() {
        let plan = PlanNode::Limit {
            limit: 3,
            child: Box::new(PlanNode::Sort {
                order_bys: vec![OrderBy::desc(Expression::column(0))],
                child: Box::new(values_leaf()),
            }),
        };

        let optimized = optimize_sort_limit_as_topn(plan);
        match optimized {
            PlanNode::TopN { n, order_bys, child } => {
                assert_eq!(n, 3);
                assert_eq!(order_bys.len(), 1);
                assert!(matches!(*child, PlanNode::Values { .. }));
            }
            _ => panic!("expected TopN"),
        }
    }

    #[test]
    fn limit_without_sort_is_untouched() {
        let plan = PlanNode::Limit {
            limit: 3,
            child: Box::new(values_leaf()),
        };
        assert!(matches!(
            optimize_sort_limit_as_topn(plan),
            PlanNode::Limit { .. }
        ));
    }

    #[test]
    fn rewrite_applies_below_other_nodes() {
        // Delete(Limit(Sort(...))) rewrites the inner pair.
        let plan = PlanNode::Delete {
            table_oid: 0,
            child: Box::new(PlanNode::Limit {
                limit: 1,
                child: Box::new(PlanNode::Sort {
                    order_bys: vec![OrderBy::asc(Expression::column(0))],
                    child: Box::new(values_leaf()),
                }),
            }),
        };

        match optimize_sort_limit_as_topn(plan) {
            PlanNode::Delete { child, .. } => {
                assert!(matches!(*child, PlanNode::TopN { .. }))
            }
            _ => panic!("expected Delete"),
        }
    }
}
