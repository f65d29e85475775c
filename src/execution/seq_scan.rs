use std::sync::Arc;

use crate::catalog::{TableInfo, TableOid};
use crate::common::{RecordId, Result, StrataError};
use crate::storage::table::TableIterator;
use crate::tuple::{Schema, Tuple};

use super::{Executor, ExecutorContext};

/// Full scan over a heap table.
pub struct SeqScanExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    iter: Option<TableIterator>,
}

impl SeqScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, table_oid: TableOid) -> Result<Self> {
        let table_info = ctx
            .catalog
            .get_table(table_oid)
            .ok_or_else(|| StrataError::TableNotFound(table_oid.to_string()))?;
        Ok(Self {
            ctx,
            table_info,
            iter: None,
        })
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        self.iter = Some(self.table_info.table.iter(&self.ctx.txn));
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let Some(iter) = self.iter.as_mut() else {
            return Ok(None);
        };
        match iter.advance()? {
            Some((rid, bytes)) => {
                let tuple = Tuple::from_bytes(Arc::clone(&self.table_info.schema), &bytes)
                    .ok_or_else(|| StrataError::TupleCodec("undecodable heap tuple".into()))?;
                Ok(Some((tuple, rid)))
            }
            None => Ok(None),
        }
    }

    fn output_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.table_info.schema)
    }
}
