use crate::bail;
use crate::error::{ErrorKind, RelayResult};
use crate::types::{ColumnDefinition, ColumnType, FieldSchema, FieldType, StructSchema};

/// Maps a column type to the structural field type its values are emitted as.
///
/// `duration` and custom types have no structural counterpart and are rejected.
pub fn field_type(column_type: &ColumnType) -> RelayResult<FieldType> {
    let field_type = match column_type {
        ColumnType::Ascii | ColumnType::Text => FieldType::String,
        ColumnType::Boolean => FieldType::Boolean,
        ColumnType::TinyInt => FieldType::Int8,
        ColumnType::SmallInt => FieldType::Int16,
        ColumnType::Int => FieldType::Int32,
        ColumnType::BigInt | ColumnType::Counter => FieldType::Int64,
        // Arbitrary precision numbers are emitted as their decimal string.
        ColumnType::Varint | ColumnType::Decimal => FieldType::String,
        ColumnType::Float => FieldType::Float32,
        ColumnType::Double => FieldType::Float64,
        ColumnType::Timestamp => FieldType::Timestamp,
        ColumnType::Date => FieldType::Date,
        ColumnType::Time => FieldType::Time,
        ColumnType::Uuid | ColumnType::TimeUuid | ColumnType::Inet => FieldType::String,
        ColumnType::Blob => FieldType::Bytes,
        ColumnType::List(inner) | ColumnType::Set(inner) => {
            FieldType::Array(Box::new(field_type(inner)?))
        }
        ColumnType::Map(key, value) => {
            FieldType::Map(Box::new(field_type(key)?), Box::new(field_type(value)?))
        }
        ColumnType::Tuple(items) => {
            let fields = items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    Ok(FieldSchema {
                        name: tuple_field_name(index),
                        field_type: field_type(item)?,
                        optional: true,
                    })
                })
                .collect::<RelayResult<Vec<_>>>()?;

            FieldType::Struct(StructSchema {
                name: "tuple".to_string(),
                fields,
            })
        }
        ColumnType::Udt(udt) => {
            let fields = udt
                .fields
                .iter()
                .map(|(name, field)| {
                    Ok(FieldSchema {
                        name: name.clone(),
                        field_type: field_type(field)?,
                        optional: true,
                    })
                })
                .collect::<RelayResult<Vec<_>>>()?;

            FieldType::Struct(StructSchema {
                name: udt.qualified_name(),
                fields,
            })
        }
        ColumnType::Duration | ColumnType::Custom(_) => {
            bail!(
                ErrorKind::UnsupportedColumnType,
                "Column type has no structural representation",
                format!("type `{column_type}` is not supported")
            );
        }
    };

    Ok(field_type)
}

/// Builds a struct schema named `name` with one optional field per column.
pub fn struct_schema<'a, I>(name: String, columns: I) -> RelayResult<StructSchema>
where
    I: IntoIterator<Item = &'a ColumnDefinition>,
{
    let fields = columns
        .into_iter()
        .map(|column| {
            let field_type = field_type(&column.column_type).map_err(|err| {
                crate::relay_error!(
                    ErrorKind::UnsupportedColumnType,
                    "Column type has no structural representation",
                    format!(
                        "column `{}` of `{name}` has unsupported type `{}`",
                        column.name, column.column_type
                    ),
                    source: err
                )
            })?;

            Ok(FieldSchema {
                name: column.name.clone(),
                field_type,
                optional: true,
            })
        })
        .collect::<RelayResult<Vec<_>>>()?;

    Ok(StructSchema { name, fields })
}

pub(crate) fn tuple_field_name(index: usize) -> String {
    format!("field{}", index + 1)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::UdtDefinition;

    #[test]
    fn maps_collections_and_udts() {
        let udt = Arc::new(UdtDefinition {
            keyspace: "ks1".to_string(),
            name: "address".to_string(),
            fields: vec![
                ("street".to_string(), ColumnType::Text),
                ("zip".to_string(), ColumnType::Int),
            ],
        });

        let mapped = field_type(&ColumnType::Map(
            Box::new(ColumnType::Text),
            Box::new(ColumnType::Set(Box::new(ColumnType::Udt(udt)))),
        ))
        .unwrap();

        let FieldType::Map(key, value) = mapped else {
            panic!("expected a map");
        };
        assert_eq!(*key, FieldType::String);
        let FieldType::Array(element) = *value else {
            panic!("expected an array");
        };
        let FieldType::Struct(schema) = *element else {
            panic!("expected a struct");
        };
        assert_eq!(schema.name, "ks1.address");
        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["street", "zip"]);
    }

    #[test]
    fn tuple_fields_are_numbered_from_one() {
        let FieldType::Struct(schema) =
            field_type(&ColumnType::Tuple(vec![ColumnType::Int, ColumnType::Text])).unwrap()
        else {
            panic!("expected a struct");
        };

        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["field1", "field2"]);
    }

    #[test]
    fn rejects_unsupported_types_with_column_detail() {
        let columns = vec![
            ColumnDefinition::regular("a", ColumnType::Text),
            ColumnDefinition::regular(
                "b",
                ColumnType::Custom("org.apache.cassandra.db.marshal.DynamicCompositeType".into()),
            ),
        ];

        let err = struct_schema("ks1.table1".to_string(), &columns).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedColumnType);
        assert!(err.detail().unwrap().starts_with("column `b` of `ks1.table1`"));
    }

    #[test]
    fn nested_duration_is_unsupported() {
        let err = field_type(&ColumnType::List(Box::new(ColumnType::Duration))).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedColumnType);
    }
}
