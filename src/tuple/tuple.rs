use std::sync::Arc;

use super::{Schema, Value};

/// A row: one value per schema column.
///
/// Serialized layout: null bitmap, then fixed-width columns in schema
/// order, then variable-width columns in schema order. NULL fixed-width
/// columns keep their zeroed footprint so later offsets stay stable.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Tuple {
    /// # Panics
    /// Panics when the value count does not match the schema.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        assert_eq!(
            values.len(),
            schema.column_count(),
            "value count must match schema column count"
        );
        Self { schema, values }
    }

    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Option<Self> {
        let values = decode(&schema, data)?;
        Some(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        let mut out = vec![0u8; self.schema.null_bitmap_size()];
        for (i, value) in self.values.iter().enumerate() {
            if value.is_null() {
                out[i / 8] |= 1 << (i % 8);
            }
        }

        for (i, column) in self.schema.columns().enumerate() {
            if column.data_type().is_fixed_size() {
                out.extend(self.values[i].serialize(column.data_type())?);
            }
        }
        for (i, column) in self.schema.columns().enumerate() {
            if !column.data_type().is_fixed_size() {
                out.extend(self.values[i].serialize(column.data_type())?);
            }
        }
        Some(out)
    }
}

fn decode(schema: &Schema, data: &[u8]) -> Option<Vec<Value>> {
    let bitmap_size = schema.null_bitmap_size();
    let bitmap = data.get(..bitmap_size)?;
    let is_null = |i: usize| bitmap[i / 8] & (1 << (i % 8)) != 0;

    let mut values = vec![Value::Null; schema.column_count()];
    let mut offset = bitmap_size;

    for (i, column) in schema.columns().enumerate() {
        if column.data_type().is_fixed_size() {
            let (value, used) = Value::deserialize(&data[offset..], column.data_type())?;
            if !is_null(i) {
                values[i] = value;
            }
            offset += used;
        }
    }
    for (i, column) in schema.columns().enumerate() {
        if !column.data_type().is_fixed_size() {
            let (value, used) = Value::deserialize(&data[offset..], column.data_type())?;
            if !is_null(i) {
                values[i] = value;
            }
            offset += used;
        }
    }
    Some(values)
}
