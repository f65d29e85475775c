use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{Result, StrataError, Transaction, DEFAULT_INTERNAL_MAX_SIZE, DEFAULT_LEAF_MAX_SIZE};
use crate::index::{BPlusTree, IndexKey, SignedIntComparator};
use crate::storage::table::TableHeap;
use crate::tuple::{Schema, Tuple, Value};

pub type TableOid = u32;
pub type IndexOid = u32;

/// Metadata for one table.
pub struct TableInfo {
    pub oid: TableOid,
    pub name: String,
    pub schema: Arc<Schema>,
    pub table: Arc<TableHeap>,
}

/// Metadata for one index.
pub struct IndexInfo {
    pub oid: IndexOid,
    pub name: String,
    pub table_name: String,
    pub key_schema: Arc<Schema>,
    /// Column positions in the table schema that form the key
    pub key_attrs: Vec<usize>,
    pub index: Arc<BPlusTree>,
}

impl IndexInfo {
    /// Extracts the index key bits from a table row. The engine indexes
    /// single INTEGER columns; a NULL key column yields None and the row
    /// is not indexed.
    pub fn key_from_tuple(&self, tuple: &Tuple) -> Option<IndexKey> {
        let attr = *self.key_attrs.first()?;
        match tuple.value(attr)? {
            Value::Integer(v) => Some(*v as IndexKey),
            _ => None,
        }
    }
}

struct CatalogState {
    tables: HashMap<TableOid, Arc<TableInfo>>,
    table_names: HashMap<String, TableOid>,
    indexes: HashMap<IndexOid, Arc<IndexInfo>>,
    /// table name -> indexes over it
    table_indexes: HashMap<String, Vec<IndexOid>>,
    next_table_oid: TableOid,
    next_index_oid: IndexOid,
}

/// In-memory catalog mapping oids to table and index metadata.
pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
    state: Mutex<CatalogState>,
}

impl Catalog {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            state: Mutex::new(CatalogState {
                tables: HashMap::new(),
                table_names: HashMap::new(),
                indexes: HashMap::new(),
                table_indexes: HashMap::new(),
                next_table_oid: 0,
                next_index_oid: 0,
            }),
        }
    }

    pub fn create_table(&self, name: impl Into<String>, schema: Schema) -> Result<Arc<TableInfo>> {
        let name = name.into();
        let mut state = self.state.lock();
        if state.table_names.contains_key(&name) {
            return Err(StrataError::TableAlreadyExists(name));
        }

        let oid = state.next_table_oid;
        state.next_table_oid += 1;

        let heap = TableHeap::new(Arc::clone(&self.bpm), oid)?;
        let info = Arc::new(TableInfo {
            oid,
            name: name.clone(),
            schema: Arc::new(schema),
            table: Arc::new(heap),
        });

        state.tables.insert(oid, Arc::clone(&info));
        state.table_names.insert(name.clone(), oid);
        state.table_indexes.entry(name.clone()).or_default();
        debug!(table = %name, oid, "created table");
        Ok(info)
    }

    /// Creates a B+ tree index over a single INTEGER column of an existing
    /// table and backfills it from the heap.
    pub fn create_index(
        &self,
        index_name: impl Into<String>,
        table_name: &str,
        key_attrs: Vec<usize>,
    ) -> Result<Arc<IndexInfo>> {
        let index_name = index_name.into();
        let mut state = self.state.lock();

        let table = state
            .table_names
            .get(table_name)
            .and_then(|oid| state.tables.get(oid))
            .cloned()
            .ok_or_else(|| StrataError::TableNotFound(table_name.to_string()))?;

        let key_schema = table
            .schema
            .project(&key_attrs)
            .ok_or_else(|| StrataError::TupleCodec("bad index key attributes".to_string()))?;

        let oid = state.next_index_oid;
        state.next_index_oid += 1;

        let tree = BPlusTree::new(
            index_name.clone(),
            Arc::clone(&self.bpm),
            Arc::new(SignedIntComparator),
            DEFAULT_LEAF_MAX_SIZE,
            DEFAULT_INTERNAL_MAX_SIZE,
        )?;

        let info = Arc::new(IndexInfo {
            oid,
            name: index_name.clone(),
            table_name: table_name.to_string(),
            key_schema: Arc::new(key_schema),
            key_attrs,
            index: Arc::new(tree),
        });

        // Backfill from rows already in the heap.
        let txn = Transaction::new();
        for entry in table.table.iter(&txn) {
            let (rid, bytes) = entry?;
            if let Some(tuple) = Tuple::from_bytes(Arc::clone(&table.schema), &bytes) {
                if let Some(key) = info.key_from_tuple(&tuple) {
                    info.index.insert(key, rid)?;
                }
            }
        }

        state.indexes.insert(oid, Arc::clone(&info));
        state
            .table_indexes
            .entry(table_name.to_string())
            .or_default()
            .push(oid);
        debug!(index = %index_name, table = %table_name, oid, "created index");
        Ok(info)
    }

    pub fn get_table(&self, oid: TableOid) -> Option<Arc<TableInfo>> {
        self.state.lock().tables.get(&oid).cloned()
    }

    pub fn get_table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        let state = self.state.lock();
        state
            .table_names
            .get(name)
            .and_then(|oid| state.tables.get(oid))
            .cloned()
    }

    pub fn get_index(&self, oid: IndexOid) -> Option<Arc<IndexInfo>> {
        self.state.lock().indexes.get(&oid).cloned()
    }

    pub fn get_table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        let state = self.state.lock();
        state
            .table_indexes
            .get(table_name)
            .map(|oids| {
                oids.iter()
                    .filter_map(|oid| state.indexes.get(oid).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::DiskManager;
    use crate::tuple::DataType;
    use tempfile::TempDir;

    fn create_catalog() -> (Catalog, TempDir) {
        let dir = TempDir::new().unwrap();
        let dm = Arc::new(DiskManager::new(dir.path().join("cat.db")).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(64, 2, dm));
        (Catalog::new(bpm), dir)
    }

    fn users_schema() -> Schema {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::VarChar(32))
            .build()
    }

    #[test]
    fn table_lifecycle() {
        let (catalog, _dir) = create_catalog();

        let info = catalog.create_table("users", users_schema()).unwrap();
        assert_eq!(info.name, "users");
        assert!(catalog.get_table(info.oid).is_some());
        assert!(catalog.get_table_by_name("users").is_some());
        assert!(catalog.create_table("users", users_schema()).is_err());
    }

    #[test]
    fn index_backfills_existing_rows() {
        let (catalog, _dir) = create_catalog();
        let txn = Transaction::new();

        let table = catalog.create_table("users", users_schema()).unwrap();
        let mut rids = Vec::new();
        for i in 0..5 {
            let tuple = Tuple::new(
                Arc::clone(&table.schema),
                vec![Value::Integer(i), Value::Varchar(format!("u{}", i))],
            );
            rids.push(
                table
                    .table
                    .insert_tuple(&tuple.to_bytes().unwrap(), &txn)
                    .unwrap(),
            );
        }

        let index = catalog.create_index("users_id", "users", vec![0]).unwrap();
        for (i, rid) in rids.iter().enumerate() {
            assert_eq!(index.index.get_value(i as u32).unwrap(), Some(*rid));
        }
        assert_eq!(catalog.get_table_indexes("users").len(), 1);
    }
}
