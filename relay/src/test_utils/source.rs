use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use config::shared::ConsistencyLevel;
use tokio::sync::{Mutex, Notify};

use crate::bail;
use crate::error::{ErrorKind, RelayResult};
use crate::source::{PreparedStatement, ReadResponse, SourceClient};
use crate::test_utils::notify::TimedNotify;
use crate::types::{Cell, NodeId, Row, TableDefinition, TableName};

/// Pauses the next read until released.
#[derive(Debug, Clone)]
pub struct ReadGate {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl ReadGate {
    /// Waits until the gated read has started.
    pub async fn wait_started(&self) {
        TimedNotify::new(self.started.clone()).notified().await;
    }

    /// Lets the gated read complete.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<TableName, TableDefinition>,
    rows: Vec<(Vec<Cell>, Row)>,
    failing: HashSet<ConsistencyLevel>,
    hanging: HashSet<ConsistencyLevel>,
    coordinator: Option<NodeId>,
    fail_prepare: bool,
    next_statement_id: u64,
    prepared: Vec<String>,
    reads: Vec<(String, ConsistencyLevel)>,
    gate: Option<ReadGate>,
}

/// Source client answering from in-memory tables and rows, with scriptable failures.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSourceClient {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedSourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(definition: TableDefinition) -> Self {
        let mut inner = Inner::default();
        inner.tables.insert(definition.name.clone(), definition);

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub async fn set_table(&self, definition: TableDefinition) {
        let mut inner = self.inner.lock().await;
        inner.tables.insert(definition.name.clone(), definition);
    }

    pub async fn drop_table(&self, name: &TableName) {
        self.inner.lock().await.tables.remove(name);
    }

    /// Stores the row of a table with a single key column.
    pub async fn put_row(&self, key: impl Into<Cell>, row: Row) {
        self.put_row_with_key(vec![key.into()], row).await;
    }

    pub async fn put_row_with_key(&self, key_values: Vec<Cell>, row: Row) {
        let mut inner = self.inner.lock().await;
        inner.rows.retain(|(key, _)| *key != key_values);
        inner.rows.push((key_values, row));
    }

    pub async fn delete_row(&self, key: impl Into<Cell>) {
        let key_values = vec![key.into()];
        self.inner
            .lock()
            .await
            .rows
            .retain(|(key, _)| *key != key_values);
    }

    /// Reads at `consistency` fail until [`Self::clear_failures`].
    pub async fn fail_at(&self, consistency: ConsistencyLevel) {
        self.inner.lock().await.failing.insert(consistency);
    }

    /// Reads at `consistency` never complete until [`Self::clear_failures`].
    pub async fn hang_at(&self, consistency: ConsistencyLevel) {
        self.inner.lock().await.hanging.insert(consistency);
    }

    pub async fn clear_failures(&self) {
        let mut inner = self.inner.lock().await;
        inner.failing.clear();
        inner.hanging.clear();
        inner.fail_prepare = false;
    }

    pub async fn fail_prepare(&self) {
        self.inner.lock().await.fail_prepare = true;
    }

    /// Node reported as coordinator of every read.
    pub async fn set_coordinator(&self, coordinator: Option<NodeId>) {
        self.inner.lock().await.coordinator = coordinator;
    }

    /// Makes the next read wait until the returned gate is released.
    pub async fn gate_next_read(&self) -> ReadGate {
        let gate = ReadGate {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        self.inner.lock().await.gate = Some(gate.clone());

        gate
    }

    pub async fn prepared_queries(&self) -> Vec<String> {
        self.inner.lock().await.prepared.clone()
    }

    /// Query text and consistency level of every read attempt.
    pub async fn reads(&self) -> Vec<(String, ConsistencyLevel)> {
        self.inner.lock().await.reads.clone()
    }

    pub async fn attempted_levels(&self) -> Vec<ConsistencyLevel> {
        self.reads()
            .await
            .into_iter()
            .map(|(_, consistency)| consistency)
            .collect()
    }
}

impl SourceClient for ScriptedSourceClient {
    async fn table_definition(&self, table: &TableName) -> RelayResult<Option<TableDefinition>> {
        Ok(self.inner.lock().await.tables.get(table).cloned())
    }

    async fn prepare(&self, query: &str) -> RelayResult<PreparedStatement> {
        let mut inner = self.inner.lock().await;
        if inner.fail_prepare {
            bail!(
                ErrorKind::StatementPreparationFailed,
                "Source rejected the statement",
                query
            );
        }

        inner.next_statement_id += 1;
        inner.prepared.push(query.to_string());

        Ok(PreparedStatement::new(inner.next_statement_id, query))
    }

    async fn read(
        &self,
        statement: &PreparedStatement,
        key_values: &[Cell],
        consistency: ConsistencyLevel,
    ) -> RelayResult<ReadResponse> {
        let gate = {
            let mut inner = self.inner.lock().await;
            inner
                .reads
                .push((statement.query().to_string(), consistency));
            inner.gate.take()
        };

        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }

        let (hanging, failing) = {
            let inner = self.inner.lock().await;
            (
                inner.hanging.contains(&consistency),
                inner.failing.contains(&consistency),
            )
        };

        if hanging {
            std::future::pending::<()>().await;
        }

        if failing {
            bail!(
                ErrorKind::SourceReadFailed,
                "Not enough replicas available",
                format!("consistency {consistency}")
            );
        }

        let inner = self.inner.lock().await;
        let row = inner
            .rows
            .iter()
            .find(|(key, _)| key.as_slice() == key_values)
            .map(|(_, row)| row.clone());

        Ok(ReadResponse {
            row,
            coordinator: inner.coordinator,
        })
    }
}
