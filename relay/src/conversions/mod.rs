//! Conversions from source column types and cells to structural schemas and values.

pub mod schema;
pub mod value;
