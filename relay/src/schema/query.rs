use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::types::{ColumnDefinition, TableName};

/// Content fingerprint of a read query, used to decide whether a prepared statement can be
/// reused after a schema change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    fn of(text: &str) -> Self {
        Self(hex::encode(Sha256::digest(text.as_bytes())))
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single-row read of the projected columns by full primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadQuery {
    text: Arc<str>,
    fingerprint: QueryFingerprint,
}

impl ReadQuery {
    /// Builds `SELECT <projection> FROM <table> WHERE <k1> = ? AND ...`.
    ///
    /// The projection is the value columns, or the key columns when no value column is
    /// selected.
    pub fn build(
        table: &TableName,
        key_columns: &[ColumnDefinition],
        value_columns: &[ColumnDefinition],
    ) -> Self {
        let projected = if value_columns.is_empty() {
            key_columns
        } else {
            value_columns
        };

        let projection = projected
            .iter()
            .map(|column| quote_identifier(&column.name))
            .collect::<Vec<_>>()
            .join(", ");

        let restriction = key_columns
            .iter()
            .map(|column| format!("{} = ?", quote_identifier(&column.name)))
            .collect::<Vec<_>>()
            .join(" AND ");

        let text = format!(
            "SELECT {projection} FROM {}.{} WHERE {restriction}",
            quote_identifier(&table.keyspace),
            quote_identifier(&table.table)
        );
        let fingerprint = QueryFingerprint::of(&text);

        Self {
            text: text.into(),
            fingerprint,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fingerprint(&self) -> &QueryFingerprint {
        &self.fingerprint
    }
}

/// Reserved CQL keywords, sorted. They cannot be used as unquoted identifiers.
const RESERVED_KEYWORDS: &[&str] = &[
    "add",
    "allow",
    "alter",
    "and",
    "apply",
    "asc",
    "authorize",
    "batch",
    "begin",
    "by",
    "columnfamily",
    "create",
    "default",
    "delete",
    "desc",
    "describe",
    "drop",
    "entries",
    "execute",
    "from",
    "full",
    "grant",
    "if",
    "in",
    "index",
    "infinity",
    "insert",
    "into",
    "is",
    "keyspace",
    "limit",
    "materialized",
    "mbean",
    "mbeans",
    "modify",
    "nan",
    "norecursive",
    "not",
    "null",
    "of",
    "on",
    "or",
    "order",
    "primary",
    "rename",
    "replace",
    "revoke",
    "schema",
    "select",
    "set",
    "table",
    "to",
    "token",
    "truncate",
    "unlogged",
    "unset",
    "update",
    "use",
    "using",
    "view",
    "where",
    "with",
];

/// Quotes a CQL identifier unless it is a plain lowercase identifier that is not a reserved
/// keyword.
pub fn quote_identifier(identifier: &str) -> Cow<'_, str> {
    let mut chars = identifier.chars();
    let plain = chars
        .next()
        .is_some_and(|first| first.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && RESERVED_KEYWORDS.binary_search(&identifier).is_err();

    if plain {
        Cow::Borrowed(identifier)
    } else {
        Cow::Owned(format!("\"{}\"", identifier.replace('"', "\"\"")))
    }
}
