use std::sync::Arc;

use crate::catalog::{IndexInfo, IndexOid, TableInfo};
use crate::common::{RecordId, Result, StrataError};
use crate::index::IndexKey;
use crate::tuple::{Schema, Tuple, Value};

use super::expression::Expression;
use super::plan::JoinType;
use super::{Executor, ExecutorContext};

/// Index nested-loop join: for every outer row, evaluates the key
/// expression and probes the inner table's index for at most one match.
/// Supports INNER and LEFT joins.
pub struct NestedIndexJoinExecutor {
    ctx: Arc<ExecutorContext>,
    join_type: JoinType,
    key_expr: Expression,
    child: Box<dyn Executor>,
    index_info: Arc<IndexInfo>,
    inner_table: Arc<TableInfo>,
    schema: Arc<Schema>,
}

impl NestedIndexJoinExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        join_type: JoinType,
        key_expr: Expression,
        index_oid: IndexOid,
        child: Box<dyn Executor>,
    ) -> Result<Self> {
        if !matches!(join_type, JoinType::Inner | JoinType::Left) {
            return Err(StrataError::NotSupported(format!(
                "nested index join type {:?}",
                join_type
            )));
        }

        let index_info = ctx
            .catalog
            .get_index(index_oid)
            .ok_or(StrataError::IndexNotFound(index_oid))?;
        let inner_table = ctx
            .catalog
            .get_table_by_name(&index_info.table_name)
            .ok_or_else(|| StrataError::TableNotFound(index_info.table_name.clone()))?;
        let schema = Arc::new(Schema::join_of(&child.output_schema(), &inner_table.schema));

        Ok(Self {
            ctx,
            join_type,
            key_expr,
            child,
            index_info,
            inner_table,
            schema,
        })
    }

    fn joined(&self, left: &Tuple, right: &Tuple) -> Tuple {
        let mut values = left.values().to_vec();
        values.extend_from_slice(right.values());
        Tuple::new(Arc::clone(&self.schema), values)
    }

    /// LEFT-join miss: pad with NULL inner columns. No heap access
    /// happens on this path.
    fn left_with_nulls(&self, left: &Tuple) -> Tuple {
        let mut values = left.values().to_vec();
        let inner_width = self.inner_table.schema.column_count();
        values.extend(std::iter::repeat(Value::Null).take(inner_width));
        Tuple::new(Arc::clone(&self.schema), values)
    }

    fn probe(&self, left: &Tuple) -> Result<Option<Tuple>> {
        let key = match self.key_expr.evaluate(left) {
            Value::Integer(v) => v as IndexKey,
            _ => return Ok(None),
        };
        let Some(rid) = self.index_info.index.get_value(key)? else {
            return Ok(None);
        };
        let Some(bytes) = self.inner_table.table.get_tuple(rid, &self.ctx.txn)? else {
            return Ok(None);
        };
        let tuple = Tuple::from_bytes(Arc::clone(&self.inner_table.schema), &bytes)
            .ok_or_else(|| StrataError::TupleCodec("undecodable heap tuple".into()))?;
        Ok(Some(tuple))
    }
}

impl Executor for NestedIndexJoinExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        while let Some((left, _)) = self.child.next()? {
            if let Some(right) = self.probe(&left)? {
                return Ok(Some((self.joined(&left, &right), RecordId::invalid())));
            }
            if self.join_type == JoinType::Left {
                return Ok(Some((self.left_with_nulls(&left), RecordId::invalid())));
            }
        }
        Ok(None)
    }

    fn output_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }
}
