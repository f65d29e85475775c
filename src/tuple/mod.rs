mod data_type;
mod schema;
#[allow(clippy::module_inception)]
mod tuple;
mod value;

pub use data_type::DataType;
pub use schema::{Column, Schema, SchemaBuilder};
pub use tuple::Tuple;
pub use value::Value;
