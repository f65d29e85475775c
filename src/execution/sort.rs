use std::cmp::Ordering;
use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::tuple::{Schema, Tuple};

use super::plan::OrderBy;
use super::Executor;

/// Compares two rows under an order-by list; incomparable values (NULLs,
/// mixed types) rank equal.
pub(crate) fn compare_rows(a: &Tuple, b: &Tuple, order_bys: &[OrderBy]) -> Ordering {
    for order_by in order_bys {
        let va = order_by.expr.evaluate(a);
        let vb = order_by.expr.evaluate(b);
        let ordering = va.compare(&vb).unwrap_or(Ordering::Equal);
        let ordering = if order_by.desc {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Materializes its child and emits the rows sorted by the order-by list.
pub struct SortExecutor {
    order_bys: Vec<OrderBy>,
    child: Box<dyn Executor>,
    rows: Vec<(Tuple, RecordId)>,
    cursor: usize,
}

impl SortExecutor {
    pub fn new(order_bys: Vec<OrderBy>, child: Box<dyn Executor>) -> Self {
        Self {
            order_bys,
            child,
            rows: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for SortExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.rows.clear();
        self.cursor = 0;
        while let Some(row) = self.child.next()? {
            self.rows.push(row);
        }
        let order_bys = std::mem::take(&mut self.order_bys);
        self.rows.sort_by(|a, b| compare_rows(&a.0, &b.0, &order_bys));
        self.order_bys = order_bys;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.cursor >= self.rows.len() {
            return Ok(None);
        }
        let row = self.rows[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(row))
    }

    fn output_schema(&self) -> Arc<Schema> {
        self.child.output_schema()
    }
}
