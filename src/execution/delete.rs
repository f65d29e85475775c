use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo, TableOid};
use crate::common::{RecordId, Result, StrataError};
use crate::tuple::{Schema, Tuple, Value};

use super::insert::count_schema;
use super::{Executor, ExecutorContext};

/// Drains its child, marking each produced rid deleted in the heap and
/// removing its entries from every index over the table, then emits one
/// tuple with the deleted row count.
pub struct DeleteExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    child: Box<dyn Executor>,
    schema: Arc<Schema>,
    done: bool,
}

impl DeleteExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        table_oid: TableOid,
        child: Box<dyn Executor>,
    ) -> Result<Self> {
        let table_info = ctx
            .catalog
            .get_table(table_oid)
            .ok_or_else(|| StrataError::TableNotFound(table_oid.to_string()))?;
        Ok(Self {
            ctx,
            table_info,
            indexes: Vec::new(),
            child,
            schema: count_schema(),
            done: false,
        })
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.indexes = self.ctx.catalog.get_table_indexes(&self.table_info.name);
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.done {
            return Ok(None);
        }

        let mut count = 0;
        while let Some((tuple, rid)) = self.child.next()? {
            if self.table_info.table.mark_delete(rid, &self.ctx.txn)? {
                for index in &self.indexes {
                    if let Some(key) = index.key_from_tuple(&tuple) {
                        index.index.remove(key)?;
                    }
                }
                count += 1;
            }
        }

        self.done = true;
        let row = Tuple::new(Arc::clone(&self.schema), vec![Value::Integer(count)]);
        Ok(Some((row, RecordId::invalid())))
    }

    fn output_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }
}
