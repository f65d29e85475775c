use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::tuple::{Schema, Tuple};

use super::plan::OrderBy;
use super::sort::compare_rows;
use super::Executor;

/// Keeps only the first `n` rows of the child's sorted order, using a
/// bounded ordered buffer instead of a full materialize-and-sort.
pub struct TopNExecutor {
    order_bys: Vec<OrderBy>,
    n: usize,
    child: Box<dyn Executor>,
    rows: Vec<(Tuple, RecordId)>,
    cursor: usize,
}

impl TopNExecutor {
    pub fn new(order_bys: Vec<OrderBy>, n: usize, child: Box<dyn Executor>) -> Self {
        Self {
            order_bys,
            n,
            child,
            rows: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for TopNExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.rows.clear();
        self.cursor = 0;

        while let Some(row) = self.child.next()? {
            if self.rows.len() == self.n {
                // Full buffer and the candidate sorts after the current
                // worst: skip without inserting.
                if let Some(last) = self.rows.last() {
                    if compare_rows(&row.0, &last.0, &self.order_bys).is_ge() {
                        continue;
                    }
                }
            }
            let at = self
                .rows
                .partition_point(|kept| compare_rows(&kept.0, &row.0, &self.order_bys).is_le());
            self.rows.insert(at, row);
            self.rows.truncate(self.n);
        }
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
