use std::fmt;
use std::sync::Arc;

use crate::types::{TableDefinition, UdtDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaChange {
    Created,
    Updated,
    Dropped,
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaChange::Created => f.write_str("created"),
            SchemaChange::Updated => f.write_str("updated"),
            SchemaChange::Dropped => f.write_str("dropped"),
        }
    }
}

/// Schema element a change applies to. Tables and types carry their new definition, or the
/// last known one when dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaElement {
    Keyspace { name: String },
    Table(TableDefinition),
    UserDefinedType(Arc<UdtDefinition>),
    Function { keyspace: String, name: String },
    Aggregate { keyspace: String, name: String },
    View { keyspace: String, name: String },
}

impl SchemaElement {
    pub fn keyspace(&self) -> &str {
        match self {
            SchemaElement::Keyspace { name } => name,
            SchemaElement::Table(definition) => &definition.name.keyspace,
            SchemaElement::UserDefinedType(udt) => &udt.keyspace,
            SchemaElement::Function { keyspace, .. }
            | SchemaElement::Aggregate { keyspace, .. }
            | SchemaElement::View { keyspace, .. } => keyspace,
        }
    }
}

/// Schema change notification as delivered by the source client.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaChangeEvent {
    pub change: SchemaChange,
    pub element: SchemaElement,
}

impl SchemaChangeEvent {
    pub fn new(change: SchemaChange, element: SchemaElement) -> Self {
        Self { change, element }
    }

    pub fn table(change: SchemaChange, definition: TableDefinition) -> Self {
        Self::new(change, SchemaElement::Table(definition))
    }

    pub fn user_defined_type(change: SchemaChange, udt: UdtDefinition) -> Self {
        Self::new(change, SchemaElement::UserDefinedType(Arc::new(udt)))
    }
}
