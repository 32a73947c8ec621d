use crate::types::{Cell, ColumnDefinition, ColumnType, Row, TableDefinition, TableName};

pub const KEYSPACE: &str = "ks1";
pub const TABLE: &str = "table1";

pub fn table_name() -> TableName {
    TableName::new(KEYSPACE, TABLE)
}

/// `ks1.table1` keyed by the text column `id`, followed by `columns`.
pub fn single_key_definition(columns: &[(&str, ColumnType)]) -> TableDefinition {
    let mut all = vec![ColumnDefinition::partition_key("id", ColumnType::Text)];
    all.extend(
        columns
            .iter()
            .map(|(name, column_type)| ColumnDefinition::regular(*name, column_type.clone())),
    );

    TableDefinition::new(table_name(), all)
}

/// Row with the text key `id` and text values.
pub fn keyed_row(id: &str, values: &[(&str, &str)]) -> Row {
    std::iter::once(("id", Cell::from(id)))
        .chain(values.iter().map(|(name, value)| (*name, Cell::from(*value))))
        .collect()
}
