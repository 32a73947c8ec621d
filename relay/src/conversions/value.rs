use crate::conversions::schema::tuple_field_name;
use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::relay_error;
use crate::types::{Cell, ColumnType, StructValue, Value};

/// Converts a cell read from a column of type `column_type` into its structural value.
///
/// Null cells convert to [`Value::Null`] whatever the column type.
pub fn convert_cell(cell: &Cell, column_type: &ColumnType) -> RelayResult<Value> {
    let value = match (column_type, cell) {
        (_, Cell::Null) => Value::Null,
        (ColumnType::Ascii | ColumnType::Text, Cell::String(value)) => Value::String(value.clone()),
        (ColumnType::Boolean, Cell::Bool(value)) => Value::Boolean(*value),
        (ColumnType::TinyInt, Cell::I8(value)) => Value::Int8(*value),
        (ColumnType::SmallInt, Cell::I16(value)) => Value::Int16(*value),
        (ColumnType::Int, Cell::I32(value)) => Value::Int32(*value),
        (ColumnType::BigInt | ColumnType::Counter, Cell::I64(value)) => Value::Int64(*value),
        (ColumnType::Varint, Cell::I64(value)) => Value::String(value.to_string()),
        (ColumnType::Varint | ColumnType::Decimal, Cell::Decimal(value)) => {
            Value::String(value.to_string())
        }
        (ColumnType::Float, Cell::F32(value)) => Value::Float32(*value),
        (ColumnType::Double, Cell::F64(value)) => Value::Float64(*value),
        (ColumnType::Timestamp, Cell::Timestamp(value)) => Value::Timestamp(*value),
        (ColumnType::Date, Cell::Date(value)) => Value::Date(*value),
        (ColumnType::Time, Cell::Time(value)) => Value::Time(*value),
        (ColumnType::Uuid | ColumnType::TimeUuid, Cell::Uuid(value)) => {
            Value::String(value.to_string())
        }
        (ColumnType::Inet, Cell::Inet(value)) => Value::String(value.to_string()),
        (ColumnType::Blob, Cell::Bytes(value)) => Value::Bytes(value.clone()),
        (ColumnType::List(inner) | ColumnType::Set(inner), Cell::List(items)) => Value::Array(
            items
                .iter()
                .map(|item| convert_cell(item, inner))
                .collect::<RelayResult<Vec<_>>>()?,
        ),
        (ColumnType::Map(key_type, value_type), Cell::Map(entries)) => Value::Map(
            entries
                .iter()
                .map(|(key, value)| {
                    Ok((convert_cell(key, key_type)?, convert_cell(value, value_type)?))
                })
                .collect::<RelayResult<Vec<_>>>()?,
        ),
        (ColumnType::Tuple(types), Cell::Tuple(items)) => {
            if types.len() != items.len() {
                return Err(mismatch(column_type, cell));
            }

            let fields = types
                .iter()
                .zip(items)
                .enumerate()
                .map(|(index, (item_type, item))| {
                    Ok((tuple_field_name(index), convert_cell(item, item_type)?))
                })
                .collect::<RelayResult<Vec<_>>>()?;

            Value::Struct(StructValue { fields })
        }
        (ColumnType::Udt(udt), Cell::Udt(values)) => {
            // Fields follow the type definition; fields missing from the value are null.
            let fields = udt
                .fields
                .iter()
                .map(|(name, field_type)| {
                    let value = values
                        .iter()
                        .find(|(field, _)| field == name)
                        .map(|(_, value)| convert_cell(value, field_type))
                        .transpose()?
                        .unwrap_or(Value::Null);
                    Ok((name.clone(), value))
                })
                .collect::<RelayResult<Vec<_>>>()?;

            Value::Struct(StructValue { fields })
        }
        _ => return Err(mismatch(column_type, cell)),
    };

    Ok(value)
}

fn mismatch(column_type: &ColumnType, cell: &Cell) -> RelayError {
    relay_error!(
        ErrorKind::ConversionError,
        "Cell does not match its column type",
        format!(
            "a `{}` cell cannot be read from a `{column_type}` column",
            cell.type_name()
        )
    )
}
