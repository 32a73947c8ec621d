use std::sync::Arc;

use regex::Regex;
use tokio::sync::OnceCell;

use crate::conversions::schema::{field_type, struct_schema};
use crate::conversions::value::convert_cell;
use crate::error::{ErrorKind, RelayResult};
use crate::schema::query::{QueryFingerprint, ReadQuery};
use crate::source::{PreparedStatement, SourceClient};
use crate::types::{
    Cell, ColumnDefinition, FieldSchema, FieldType, NoticeKey, Row, StructSchema, StructValue,
    TableDefinition, TableName, Value,
};
use crate::{bail, relay_error};

/// Everything the reconciliation loop needs to read back and convert rows of the watched
/// table under one schema version.
///
/// Bindings are immutable once published. The prepared statement is created lazily on first
/// use and shared with the next binding when its query is unchanged.
#[derive(Debug)]
pub struct SchemaBinding {
    table: TableName,
    generation: u64,
    key_columns: Vec<ColumnDefinition>,
    value_columns: Vec<ColumnDefinition>,
    key_schema: FieldType,
    value_schema: Arc<StructSchema>,
    query: ReadQuery,
    statement: Arc<OnceCell<PreparedStatement>>,
}

impl SchemaBinding {
    /// Builds a binding for `definition`.
    ///
    /// Every primary key column is kept. Non-key columns are kept when `column_pattern` is
    /// [`None`] or fully matches their name.
    pub fn build(
        definition: &TableDefinition,
        column_pattern: Option<&Regex>,
        generation: u64,
    ) -> RelayResult<Self> {
        let key_columns: Vec<ColumnDefinition> = definition.primary_key().cloned().collect();
        if key_columns.is_empty() {
            bail!(
                ErrorKind::MissingKeyColumn,
                "Table has no primary key column",
                definition.name
            );
        }

        let value_columns: Vec<ColumnDefinition> = definition
            .non_key_columns()
            .filter(|column| column_pattern.is_none_or(|pattern| pattern.is_match(&column.name)))
            .cloned()
            .collect();

        let value_schema = struct_schema(definition.name.to_string(), &value_columns)?;
        let key_schema = match key_columns.as_slice() {
            [single] => field_type(&single.column_type)?,
            _ => FieldType::Struct(struct_schema(
                format!("{}.key", definition.name),
                &key_columns,
            )?),
        };
        let query = ReadQuery::build(&definition.name, &key_columns, &value_columns);

        Ok(Self {
            table: definition.name.clone(),
            generation,
            key_columns,
            value_columns,
            key_schema,
            value_schema: Arc::new(value_schema),
            query,
            statement: Arc::new(OnceCell::new()),
        })
    }

    /// Shares the prepared statement of `previous` when both bindings issue the same query.
    ///
    /// Returns whether the statement was carried over.
    pub(crate) fn carry_statement_from(&mut self, previous: &SchemaBinding) -> bool {
        if self.query.fingerprint() != previous.query.fingerprint() {
            return false;
        }

        self.statement = previous.statement.clone();
        true
    }

    /// Returns the prepared read statement, preparing it on first use.
    pub async fn prepared_statement<C>(&self, client: &C) -> RelayResult<PreparedStatement>
    where
        C: SourceClient + Sync,
    {
        let statement = self
            .statement
            .get_or_try_init(|| async {
                client.prepare(self.query.text()).await.map_err(|err| {
                    relay_error!(
                        ErrorKind::StatementPreparationFailed,
                        "Failed to prepare the read-back statement",
                        self.query.text(),
                        source: err
                    )
                })
            })
            .await?;

        Ok(statement.clone())
    }

    pub fn is_prepared(&self) -> bool {
        self.statement.initialized()
    }

    /// Returns whether both bindings use the same prepared statement slot.
    pub fn shares_statement_with(&self, other: &SchemaBinding) -> bool {
        Arc::ptr_eq(&self.statement, &other.statement)
    }

    /// Extracts the primary key values of `key` in key column order.
    pub fn key_values(&self, key: &NoticeKey) -> RelayResult<Vec<Cell>> {
        let total = self.key_columns.len();

        self.key_columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                key.value_of(index, &column.name, total)
                    .cloned()
                    .ok_or_else(|| {
                        relay_error!(
                            ErrorKind::MissingKeyColumn,
                            "Change notice key lacks a primary key column",
                            format!("column `{}` of `{}`", column.name, self.table)
                        )
                    })
            })
            .collect()
    }

    /// Converts primary key values into the record key: the bare value for a single key
    /// column, a struct otherwise.
    pub fn convert_key(&self, key_values: &[Cell]) -> RelayResult<Value> {
        if key_values.len() != self.key_columns.len() {
            bail!(
                ErrorKind::MissingKeyColumn,
                "Primary key value count does not match the key columns",
                format!(
                    "expected {} values, got {}",
                    self.key_columns.len(),
                    key_values.len()
                )
            );
        }

        if let [column] = self.key_columns.as_slice() {
            return convert_cell(&key_values[0], &column.column_type);
        }

        let fields = self
            .key_columns
            .iter()
            .zip(key_values)
            .map(|(column, cell)| {
                Ok((column.name.clone(), convert_cell(cell, &column.column_type)?))
            })
            .collect::<RelayResult<Vec<_>>>()?;

        Ok(Value::Struct(StructValue { fields }))
    }

    /// Converts a read-back row into the record value over the projected columns.
    ///
    /// A missing row converts to [`None`].
    pub fn convert_row(&self, row: Option<&Row>) -> RelayResult<Option<StructValue>> {
        let Some(row) = row else {
            return Ok(None);
        };

        let fields = self
            .value_columns
            .iter()
            .map(|column| {
                let cell = row.get(&column.name).unwrap_or(&Cell::Null);
                let value = convert_cell(cell, &column.column_type).map_err(|err| {
                    relay_error!(
                        ErrorKind::ConversionError,
                        "Failed to convert a read-back column",
                        format!("column `{}` of `{}`", column.name, self.table),
                        source: err
                    )
                })?;
                Ok((column.name.clone(), value))
            })
            .collect::<RelayResult<Vec<_>>>()?;

        Ok(Some(StructValue { fields }))
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Monotonic number of the schema version this binding was built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn key_columns(&self) -> &[ColumnDefinition] {
        &self.key_columns
    }

    pub fn value_columns(&self) -> &[ColumnDefinition] {
        &self.value_columns
    }

    pub fn key_schema(&self) -> &FieldType {
        &self.key_schema
    }

    pub fn value_schema(&self) -> &Arc<StructSchema> {
        &self.value_schema
    }

    pub fn value_field(&self, name: &str) -> Option<&FieldSchema> {
        self.value_schema.field(name)
    }

    pub fn query(&self) -> &ReadQuery {
        &self.query
    }

    pub fn fingerprint(&self) -> &QueryFingerprint {
        self.query.fingerprint()
    }
}
