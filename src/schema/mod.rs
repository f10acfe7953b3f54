pub mod describe;
pub mod schema_importer;
pub mod schema_node;

pub use describe::describe_node;
pub use schema_importer::SchemaImporter;
pub use schema_node::{Cardinality, NameMatcher, Schema, SchemaNode};
