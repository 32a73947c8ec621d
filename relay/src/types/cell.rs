use std::net::IpAddr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single value as read from the source database.
///
/// Variants follow the CQL native types. Arbitrary precision integers (`varint`) are stored
/// as a [`BigDecimal`] with zero scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(BigDecimal),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Inet(IpAddr),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    List(Vec<Cell>),
    Map(Vec<(Cell, Cell)>),
    Tuple(Vec<Cell>),
    /// User-defined type value as field name and value pairs.
    Udt(Vec<(String, Cell)>),
}

impl Cell {
    /// Short name of the variant, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "bool",
            Cell::I8(_) => "i8",
            Cell::I16(_) => "i16",
            Cell::I32(_) => "i32",
            Cell::I64(_) => "i64",
            Cell::F32(_) => "f32",
            Cell::F64(_) => "f64",
            Cell::Decimal(_) => "decimal",
            Cell::String(_) => "string",
            Cell::Bytes(_) => "bytes",
            Cell::Uuid(_) => "uuid",
            Cell::Inet(_) => "inet",
            Cell::Timestamp(_) => "timestamp",
            Cell::Date(_) => "date",
            Cell::Time(_) => "time",
            Cell::List(_) => "list",
            Cell::Map(_) => "map",
            Cell::Tuple(_) => "tuple",
            Cell::Udt(_) => "udt",
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I32(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<Uuid> for Cell {
    fn from(value: Uuid) -> Self {
        Cell::Uuid(value)
    }
}

/// A row read back from the source, as column name and value pairs.
///
/// Columns absent from the row are read as [`Cell::Null`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<(String, Cell)>,
}

impl Row {
    pub fn new(values: Vec<(String, Cell)>) -> Self {
        Self { values }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<N, C> FromIterator<(N, C)> for Row
where
    N: Into<String>,
    C: Into<Cell>,
{
    fn from_iter<I: IntoIterator<Item = (N, C)>>(iter: I) -> Self {
        Row::new(
            iter.into_iter()
                .map(|(name, cell)| (name.into(), cell.into()))
                .collect(),
        )
    }
}
