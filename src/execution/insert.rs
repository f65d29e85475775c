use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo, TableOid};
use crate::common::{RecordId, Result, StrataError};
use crate::tuple::{DataType, Schema, Tuple, Value};

use super::{Executor, ExecutorContext};

/// Schema of the single count row emitted by Insert and Delete.
pub(crate) fn count_schema() -> Arc<Schema> {
    Schema::builder().column("count", DataType::Integer).build_arc()
}

/// Drains its child into the target heap, maintaining every index over
/// the table, then emits one tuple with the inserted row count.
pub struct InsertExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    child: Box<dyn Executor>,
    schema: Arc<Schema>,
    done: bool,
}

impl InsertExecutor {
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

impl Executor for InsertExecutor {
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
        while let Some((tuple, _)) = self.child.next()? {
            let bytes = tuple
                .to_bytes()
                .ok_or_else(|| StrataError::TupleCodec("unserializable row".into()))?;
            let rid = self.table_info.table.insert_tuple(&bytes, &self.ctx.txn)?;

            for index in &self.indexes {
                if let Some(key) = index.key_from_tuple(&tuple) {
                    index.index.insert(key, rid)?;
                }
            }
            count += 1;
        }

        self.done = true;
        let row = Tuple::new(Arc::clone(&self.schema), vec![Value::Integer(count)]);
        Ok(Some((row, RecordId::invalid())))
    }

    fn output_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }
}
