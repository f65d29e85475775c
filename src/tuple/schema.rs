use std::collections::HashMap;
use std::sync::Arc;

use super::DataType;

/// One column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
    nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// An ordered list of columns with name lookup.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
    name_to_index: HashMap<String, usize>,
    null_bitmap_size: usize,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let name_to_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        let null_bitmap_size = columns.len().div_ceil(8);
        Self {
            columns,
            name_to_index,
            null_bitmap_size,
        }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// One bit per column, 1 = NULL.
    pub fn null_bitmap_size(&self) -> usize {
        self.null_bitmap_size
    }

    /// Schema with the selected columns, in the given order.
    pub fn project(&self, column_indices: &[usize]) -> Option<Schema> {
        column_indices
            .iter()
            .map(|&i| self.columns.get(i).cloned())
            .collect::<Option<Vec<_>>>()
            .map(Schema::new)
    }

    /// Concatenation of two schemas, as produced by a join. Right-side
    /// columns become nullable so LEFT joins can emit NULL padding.
    pub fn join_of(left: &Schema, right: &Schema) -> Schema {
        let mut columns = left.columns.clone();
        columns.extend(
            right
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data_type, true)),
        );
        Schema::new(columns)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

#[derive(Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, false));
        self
    }

    pub fn nullable_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, true));
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }

    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::VarChar(64))
            .nullable_column("note", DataType::VarChar(64))
            .build()
    }

    #[test]
    fn lookup_by_name() {
        let schema = sample();
        assert_eq!(schema.column_count(), 3);
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("missing"), None);
        assert!(schema.column(2).unwrap().is_nullable());
    }

    #[test]
    fn projection_preserves_order() {
        let schema = sample();
        let projected = schema.project(&[2, 0]).unwrap();
        assert_eq!(projected.column(0).unwrap().name(), "note");
        assert_eq!(projected.column(1).unwrap().name(), "id");
        assert!(schema.project(&[9]).is_none());
    }

    #[test]
    fn join_schema_concatenates() {
        let left = sample();
        let right = Schema::builder().column("x", DataType::Integer).build();
        let joined = Schema::join_of(&left, &right);
        assert_eq!(joined.column_count(), 4);
        assert_eq!(joined.column(3).unwrap().name(), "x");
        assert!(joined.column(3).unwrap().is_nullable());
    }
}
