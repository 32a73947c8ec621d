use std::future::Future;
use std::sync::Arc;

use config::shared::ConsistencyLevel;

use crate::error::RelayResult;
use crate::types::{Cell, NodeId, Row, TableDefinition, TableName};

/// Handle to a statement prepared on the source database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    id: u64,
    query: Arc<str>,
}

impl PreparedStatement {
    pub fn new(id: u64, query: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            query: query.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

/// Result of a single-row read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResponse {
    /// The row, or [`None`] when it does not exist.
    pub row: Option<Row>,
    /// Node that coordinated the read, when the driver reports it.
    pub coordinator: Option<NodeId>,
}

/// Client of the source database.
///
/// Implementations wrap a driver session. Schema change notifications are delivered by the
/// implementation to a [`crate::schema::SchemaBindingManager`] on the driver's own thread.
pub trait SourceClient {
    /// Returns the current definition of `table`, or [`None`] when it does not exist.
    fn table_definition(
        &self,
        table: &TableName,
    ) -> impl Future<Output = RelayResult<Option<TableDefinition>>> + Send;

    /// Prepares `query` for repeated execution.
    fn prepare(&self, query: &str) -> impl Future<Output = RelayResult<PreparedStatement>> + Send;

    /// Executes a prepared single-row read with the primary key values bound in key order.
    fn read(
        &self,
        statement: &PreparedStatement,
        key_values: &[Cell],
        consistency: ConsistencyLevel,
    ) -> impl Future<Output = RelayResult<ReadResponse>> + Send;
}
