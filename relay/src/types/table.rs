use std::fmt;
use std::sync::Arc;

/// Fully qualified name of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub keyspace: String,
    pub table: String,
}

impl TableName {
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.keyspace, self.table)
    }
}

/// Definition of a user-defined type.
#[derive(Debug, Clone, PartialEq)]
pub struct UdtDefinition {
    pub keyspace: String,
    pub name: String,
    pub fields: Vec<(String, ColumnType)>,
}

impl UdtDefinition {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.keyspace, self.name)
    }
}

/// CQL column types.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Ascii,
    Text,
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Counter,
    Varint,
    Float,
    Double,
    Decimal,
    Timestamp,
    Date,
    Time,
    Duration,
    Uuid,
    TimeUuid,
    Inet,
    Blob,
    List(Box<ColumnType>),
    Set(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Tuple(Vec<ColumnType>),
    Udt(Arc<UdtDefinition>),
    /// Server side custom type, identified by its marshaller class.
    Custom(String),
}

impl ColumnType {
    /// Replaces every reference to `udt` (matched by keyspace and name) with the given
    /// definition, returning whether anything changed.
    pub fn substitute_udt(&mut self, udt: &Arc<UdtDefinition>) -> bool {
        match self {
            ColumnType::Udt(current)
                if current.keyspace == udt.keyspace && current.name == udt.name =>
            {
                if current.as_ref() == udt.as_ref() {
                    return false;
                }
                *current = udt.clone();
                true
            }
            ColumnType::Udt(current) => {
                // Nested UDT fields may reference the updated type.
                let mut nested = current.as_ref().clone();
                let changed = nested
                    .fields
                    .iter_mut()
                    .fold(false, |changed, (_, field)| field.substitute_udt(udt) || changed);
                if changed {
                    *current = Arc::new(nested);
                }
                changed
            }
            ColumnType::List(inner) | ColumnType::Set(inner) => inner.substitute_udt(udt),
            ColumnType::Map(key, value) => {
                let key_changed = key.substitute_udt(udt);
                value.substitute_udt(udt) || key_changed
            }
            ColumnType::Tuple(items) => items
                .iter_mut()
                .fold(false, |changed, item| item.substitute_udt(udt) || changed),
            _ => false,
        }
    }

    /// Returns whether this type references the user-defined type `keyspace.name`.
    pub fn references_udt(&self, keyspace: &str, name: &str) -> bool {
        match self {
            ColumnType::Udt(udt) => {
                (udt.keyspace == keyspace && udt.name == name)
                    || udt
                        .fields
                        .iter()
                        .any(|(_, field)| field.references_udt(keyspace, name))
            }
            ColumnType::List(inner) | ColumnType::Set(inner) => {
                inner.references_udt(keyspace, name)
            }
            ColumnType::Map(key, value) => {
                key.references_udt(keyspace, name) || value.references_udt(keyspace, name)
            }
            ColumnType::Tuple(items) => items
                .iter()
                .any(|item| item.references_udt(keyspace, name)),
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Ascii => f.write_str("ascii"),
            ColumnType::Text => f.write_str("text"),
            ColumnType::Boolean => f.write_str("boolean"),
            ColumnType::TinyInt => f.write_str("tinyint"),
            ColumnType::SmallInt => f.write_str("smallint"),
            ColumnType::Int => f.write_str("int"),
            ColumnType::BigInt => f.write_str("bigint"),
            ColumnType::Counter => f.write_str("counter"),
            ColumnType::Varint => f.write_str("varint"),
            ColumnType::Float => f.write_str("float"),
            ColumnType::Double => f.write_str("double"),
            ColumnType::Decimal => f.write_str("decimal"),
            ColumnType::Timestamp => f.write_str("timestamp"),
            ColumnType::Date => f.write_str("date"),
            ColumnType::Time => f.write_str("time"),
            ColumnType::Duration => f.write_str("duration"),
            ColumnType::Uuid => f.write_str("uuid"),
            ColumnType::TimeUuid => f.write_str("timeuuid"),
            ColumnType::Inet => f.write_str("inet"),
            ColumnType::Blob => f.write_str("blob"),
            ColumnType::List(inner) => write!(f, "list<{inner}>"),
            ColumnType::Set(inner) => write!(f, "set<{inner}>"),
            ColumnType::Map(key, value) => write!(f, "map<{key}, {value}>"),
            ColumnType::Tuple(items) => {
                f.write_str("tuple<")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(">")
            }
            ColumnType::Udt(udt) => write!(f, "frozen<{}>", udt.qualified_name()),
            ColumnType::Custom(class) => write!(f, "'{class}'"),
        }
    }
}

/// Role of a column in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    PartitionKey,
    Clustering,
    Static,
    Regular,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub kind: ColumnKind,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            column_type,
            kind,
        }
    }

    pub fn partition_key(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self::new(name, column_type, ColumnKind::PartitionKey)
    }

    pub fn clustering(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self::new(name, column_type, ColumnKind::Clustering)
    }

    pub fn regular(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self::new(name, column_type, ColumnKind::Regular)
    }

    pub fn is_primary_key(&self) -> bool {
        matches!(self.kind, ColumnKind::PartitionKey | ColumnKind::Clustering)
    }
}

/// Definition of a table as reported by the source's metadata.
///
/// Columns are kept in definition order: partition key columns, then clustering columns,
/// then the remaining columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: TableName,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: TableName, columns: Vec<ColumnDefinition>) -> Self {
        Self { name, columns }
    }

    /// Primary key columns in key order.
    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnDefinition> {
        let partition = self
            .columns
            .iter()
            .filter(|column| column.kind == ColumnKind::PartitionKey);
        let clustering = self
            .columns
            .iter()
            .filter(|column| column.kind == ColumnKind::Clustering);
        partition.chain(clustering)
    }

    /// Non-key columns in definition order.
    pub fn non_key_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|column| !column.is_primary_key())
    }

    /// Returns whether any column references the user-defined type `keyspace.name`.
    pub fn references_udt(&self, keyspace: &str, name: &str) -> bool {
        self.columns
            .iter()
            .any(|column| column.column_type.references_udt(keyspace, name))
    }

    /// Substitutes `udt` into every column referencing it, returning whether any column
    /// changed.
    pub fn substitute_udt(&mut self, udt: &Arc<UdtDefinition>) -> bool {
        self.columns
            .iter_mut()
            .fold(false, |changed, column| {
                column.column_type.substitute_udt(udt) || changed
            })
    }
}
