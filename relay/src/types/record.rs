use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Type of a field in a structural schema.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bytes,
    Timestamp,
    Date,
    Time,
    Array(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
    Struct(StructSchema),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub optional: bool,
}

/// Named structural schema, e.g. the value schema `<keyspace>.<table>` of emitted records.
#[derive(Debug, Clone, PartialEq)]
pub struct StructSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl StructSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }
}

/// A value conforming to a [`FieldType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Struct(StructValue),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructValue {
    pub fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

/// Record appended to the event log for one reconciled change notice.
///
/// `value` is [`None`] when the row no longer exists, i.e. the mutation was a delete.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub topic: String,
    pub partition: Option<i32>,
    pub key: Value,
    pub key_schema: FieldType,
    pub value: Option<StructValue>,
    pub value_schema: Arc<StructSchema>,
}

impl OutputRecord {
    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }
}
