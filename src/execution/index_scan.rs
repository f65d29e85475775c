use std::sync::Arc;

use crate::catalog::{IndexInfo, IndexOid, TableInfo};
use crate::common::{RecordId, Result, StrataError};
use crate::tuple::{Schema, Tuple};

use super::{Executor, ExecutorContext};

/// Key-ordered scan: buffers the index's record ids at init and hydrates
/// each tuple from the heap on demand.
pub struct IndexScanExecutor {
    ctx: Arc<ExecutorContext>,
    index_info: Arc<IndexInfo>,
    table_info: Arc<TableInfo>,
    rids: Vec<RecordId>,
    cursor: usize,
}

impl IndexScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, index_oid: IndexOid) -> Result<Self> {
        let index_info = ctx
            .catalog
            .get_index(index_oid)
            .ok_or(StrataError::IndexNotFound(index_oid))?;
        let table_info = ctx
            .catalog
            .get_table_by_name(&index_info.table_name)
            .ok_or_else(|| StrataError::TableNotFound(index_info.table_name.clone()))?;
        Ok(Self {
            ctx,
            index_info,
            table_info,
            rids: Vec::new(),
            cursor: 0,
        })
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> Result<()> {
        self.rids.clear();
        self.cursor = 0;
        for entry in self.index_info.index.begin()? {
            let (_, rid) = entry?;
            self.rids.push(rid);
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        while self.cursor < self.rids.len() {
            let rid = self.rids[self.cursor];
            self.cursor += 1;

            // A row can disappear between the index snapshot and the heap
            // read; skip it rather than ending the scan.
            if let Some(bytes) = self.table_info.table.get_tuple(rid, &self.ctx.txn)? {
                let tuple = Tuple::from_bytes(Arc::clone(&self.table_info.schema), &bytes)
                    .ok_or_else(|| StrataError::TupleCodec("undecodable heap tuple".into()))?;
                return Ok(Some((tuple, rid)));
            }
        }
        Ok(None)
    }

    fn output_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.table_info.schema)
    }
}
