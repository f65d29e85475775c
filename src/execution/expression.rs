use std::cmp::Ordering;

use crate::tuple::{Tuple, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl ComparisonOp {
    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Eq => ordering == Ordering::Equal,
            ComparisonOp::NotEq => ordering != Ordering::Equal,
            ComparisonOp::Lt => ordering == Ordering::Less,
            ComparisonOp::LtEq => ordering != Ordering::Greater,
            ComparisonOp::Gt => ordering == Ordering::Greater,
            ComparisonOp::GtEq => ordering != Ordering::Less,
        }
    }
}

/// Evaluable expression over one or two tuples.
///
/// Column references name a side: side 0 is the only tuple in single-tuple
/// contexts and the left/outer tuple in joins; side 1 is the right/inner
/// tuple. Comparisons involving NULL evaluate to NULL.
#[derive(Debug, Clone)]
pub enum Expression {
    ColumnRef { tuple_idx: usize, col_idx: usize },
    Constant(Value),
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn column(col_idx: usize) -> Self {
        Expression::ColumnRef {
            tuple_idx: 0,
            col_idx,
        }
    }

    pub fn join_column(tuple_idx: usize, col_idx: usize) -> Self {
        Expression::ColumnRef { tuple_idx, col_idx }
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn comparison(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn evaluate(&self, tuple: &Tuple) -> Value {
        match self {
            Expression::ColumnRef { tuple_idx, col_idx } => {
                debug_assert_eq!(*tuple_idx, 0, "single-tuple context");
                tuple.value(*col_idx).cloned().unwrap_or(Value::Null)
            }
            Expression::Constant(value) => value.clone(),
            Expression::Comparison { op, left, right } => {
                compare(op, &left.evaluate(tuple), &right.evaluate(tuple))
            }
        }
    }

    pub fn evaluate_join(&self, left_tuple: &Tuple, right_tuple: &Tuple) -> Value {
        match self {
            Expression::ColumnRef { tuple_idx, col_idx } => {
                let tuple = if *tuple_idx == 0 { left_tuple } else { right_tuple };
                tuple.value(*col_idx).cloned().unwrap_or(Value::Null)
            }
            Expression::Constant(value) => value.clone(),
            Expression::Comparison { op, left, right } => compare(
                op,
                &left.evaluate_join(left_tuple, right_tuple),
                &right.evaluate_join(left_tuple, right_tuple),
            ),
        }
    }
}

fn compare(op: &ComparisonOp, left: &Value, right: &Value) -> Value {
    match left.compare(right) {
        Some(ordering) => Value::Boolean(op.holds(ordering)),
        None => Value::Null,
    }
}

/// A predicate matches only on a non-null true.
pub fn value_is_true(value: &Value) -> bool {
    matches!(value, Value::Boolean(true))
}
