//! Data types shared by the reconciliation pipeline.

mod cell;
mod notice;
mod record;
mod table;

pub use cell::{Cell, Row};
pub use notice::{CacheKey, ChangeNotice, MutationDigest, NodeId, NoticeKey, SourcePosition};
pub use record::{FieldSchema, FieldType, OutputRecord, StructSchema, StructValue, Value};
pub use table::{
    ColumnDefinition, ColumnKind, ColumnType, TableDefinition, TableName, UdtDefinition,
};
