use std::sync::{Arc, Mutex, PoisonError};

use metrics::gauge;
use regex::Regex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bail;
use crate::error::{ErrorKind, RelayResult};
use crate::metrics::{RELAY_SCHEMA_DEGRADED, TABLE_LABEL};
use crate::schema::binding::SchemaBinding;
use crate::schema::event::{SchemaChange, SchemaChangeEvent, SchemaElement};
use crate::source::SourceClient;
use crate::types::{TableDefinition, TableName, UdtDefinition};

/// Whether the watched table currently has a usable schema binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaHealth {
    Healthy,
    /// The last schema change could not be applied. The previous binding stays published.
    Degraded { reason: String },
}

impl SchemaHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, SchemaHealth::Healthy)
    }
}

/// What a schema change event did to the published binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaEventOutcome {
    /// The event does not concern the watched table.
    Ignored,
    /// A new binding was published.
    Rebuilt { generation: u64 },
    /// The change could not be applied and health is now degraded.
    Degraded,
}

#[derive(Debug)]
struct ManagerState {
    /// Last known definition of the table, [`None`] once dropped.
    definition: Option<TableDefinition>,
    generation: u64,
}

#[derive(Debug)]
struct Inner {
    table: TableName,
    column_pattern: Option<Regex>,
    state: Mutex<ManagerState>,
    binding_tx: watch::Sender<Arc<SchemaBinding>>,
    health_tx: watch::Sender<SchemaHealth>,
}

/// Owns the published [`SchemaBinding`] of the watched table and rebuilds it on schema
/// changes.
///
/// Schema change events are handled synchronously on the caller's thread, typically the
/// source driver's event thread. Readers take the current binding with [`Self::current`],
/// which never waits on a rebuild in progress.
#[derive(Debug, Clone)]
pub struct SchemaBindingManager {
    inner: Arc<Inner>,
}

impl SchemaBindingManager {
    /// Looks up the watched table and publishes its first binding.
    ///
    /// Fails with [`ErrorKind::MissingTable`] when the table does not exist.
    pub async fn load<C>(
        client: &C,
        table: TableName,
        column_pattern: Option<Regex>,
    ) -> RelayResult<Self>
    where
        C: SourceClient,
    {
        let Some(definition) = client.table_definition(&table).await? else {
            bail!(
                ErrorKind::MissingTable,
                "Watched table does not exist",
                table
            );
        };

        Self::new(definition, column_pattern)
    }

    /// Publishes the first binding built from `definition`.
    pub fn new(definition: TableDefinition, column_pattern: Option<Regex>) -> RelayResult<Self> {
        crate::metrics::register_metrics();

        let binding = SchemaBinding::build(&definition, column_pattern.as_ref(), 1)?;
        info!(
            table = %definition.name,
            query = binding.query().text(),
            "published initial schema binding"
        );

        let (binding_tx, _) = watch::channel(Arc::new(binding));
        let (health_tx, _) = watch::channel(SchemaHealth::Healthy);
        let manager = Self {
            inner: Arc::new(Inner {
                table: definition.name.clone(),
                column_pattern,
                state: Mutex::new(ManagerState {
                    definition: Some(definition),
                    generation: 1,
                }),
                binding_tx,
                health_tx,
            }),
        };
        manager.record_health(SchemaHealth::Healthy);

        Ok(manager)
    }

    /// Returns the binding in effect right now.
    ///
    /// Callers keep the returned binding for the whole processing of one notice.
    pub fn current(&self) -> Arc<SchemaBinding> {
        self.inner.binding_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SchemaBinding>> {
        self.inner.binding_tx.subscribe()
    }

    pub fn health(&self) -> SchemaHealth {
        self.inner.health_tx.borrow().clone()
    }

    pub fn subscribe_health(&self) -> watch::Receiver<SchemaHealth> {
        self.inner.health_tx.subscribe()
    }

    pub fn table(&self) -> &TableName {
        &self.inner.table
    }

    /// Applies a schema change event.
    ///
    /// Creating or updating the watched table rebuilds the binding from the new definition.
    /// Creating or updating a type the table uses rebuilds it from the last definition with
    /// the new type substituted. Dropping the table degrades health. Any other event is
    /// ignored.
    pub fn handle_event(&self, event: &SchemaChangeEvent) -> SchemaEventOutcome {
        if event.element.keyspace() != self.inner.table.keyspace {
            return SchemaEventOutcome::Ignored;
        }

        match (&event.change, &event.element) {
            (SchemaChange::Created | SchemaChange::Updated, SchemaElement::Table(definition))
                if definition.name == self.inner.table =>
            {
                self.on_definition_changed(definition.clone())
            }
            (SchemaChange::Dropped, SchemaElement::Table(definition))
                if definition.name == self.inner.table =>
            {
                self.on_table_dropped()
            }
            (
                SchemaChange::Created | SchemaChange::Updated,
                SchemaElement::UserDefinedType(udt),
            ) => self.on_udt_changed(udt),
            _ => {
                debug!(change = %event.change, element = ?event.element, "ignoring schema change");
                SchemaEventOutcome::Ignored
            }
        }
    }

    /// Rebuilds and publishes the binding from a new definition of the watched table.
    pub fn on_definition_changed(&self, definition: TableDefinition) -> SchemaEventOutcome {
        let mut state = self.lock_state();
        state.definition = Some(definition);
        self.rebuild(&mut state)
    }

    fn on_udt_changed(&self, udt: &Arc<UdtDefinition>) -> SchemaEventOutcome {
        let mut state = self.lock_state();
        let Some(definition) = state.definition.as_mut() else {
            return SchemaEventOutcome::Ignored;
        };

        if !definition.references_udt(&udt.keyspace, &udt.name) {
            debug!(udt = %udt.qualified_name(), "ignoring type not used by the watched table");
            return SchemaEventOutcome::Ignored;
        }

        if !definition.substitute_udt(udt) {
            debug!(udt = %udt.qualified_name(), "type of the watched table is unchanged");
            return SchemaEventOutcome::Ignored;
        }

        info!(
            table = %self.inner.table,
            udt = %udt.qualified_name(),
            "user-defined type of the watched table changed"
        );
        self.rebuild(&mut state)
    }

    fn on_table_dropped(&self) -> SchemaEventOutcome {
        let mut state = self.lock_state();
        state.definition = None;

        warn!(table = %self.inner.table, "watched table was dropped");
        self.record_health(SchemaHealth::Degraded {
            reason: format!("table {} was dropped", self.inner.table),
        });

        SchemaEventOutcome::Degraded
    }

    fn rebuild(&self, state: &mut ManagerState) -> SchemaEventOutcome {
        let Some(definition) = state.definition.as_ref() else {
            return SchemaEventOutcome::Ignored;
        };

        let generation = state.generation + 1;
        let mut binding = match SchemaBinding::build(
            definition,
            self.inner.column_pattern.as_ref(),
            generation,
        ) {
            Ok(binding) => binding,
            Err(err) => {
                warn!(
                    table = %self.inner.table,
                    error = %err,
                    "keeping the previous schema binding, the new definition is unusable"
                );
                self.record_health(SchemaHealth::Degraded {
                    reason: err.detail().unwrap_or(err.description()).to_string(),
                });
                return SchemaEventOutcome::Degraded;
            }
        };

        let reused = binding.carry_statement_from(&self.current());
        state.generation = generation;

        info!(
            table = %self.inner.table,
            generation,
            query = binding.query().text(),
            reused_statement = reused,
            "published schema binding"
        );

        self.inner.binding_tx.send_replace(Arc::new(binding));
        self.record_health(SchemaHealth::Healthy);

        SchemaEventOutcome::Rebuilt { generation }
    }

    fn record_health(&self, health: SchemaHealth) {
        let degraded = if health.is_healthy() { 0.0 } else { 1.0 };
        gauge!(RELAY_SCHEMA_DEGRADED, TABLE_LABEL => self.inner.table.to_string()).set(degraded);

        self.inner.health_tx.send_replace(health);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ManagerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDefinition, ColumnType};

    fn table() -> TableName {
        TableName::new("ks1", "table1")
    }

    fn definition(columns: &[(&str, ColumnType)]) -> TableDefinition {
        let mut all = vec![ColumnDefinition::partition_key("id", ColumnType::Text)];
        all.extend(
            columns
                .iter()
                .map(|(name, column_type)| ColumnDefinition::regular(*name, column_type.clone())),
        );
        TableDefinition::new(table(), all)
    }

    fn address(fields: &[&str]) -> UdtDefinition {
        UdtDefinition {
            keyspace: "ks1".to_string(),
            name: "address".to_string(),
            fields: fields
                .iter()
                .map(|field| (field.to_string(), ColumnType::Text))
                .collect(),
        }
    }

    fn manager(columns: &[(&str, ColumnType)]) -> SchemaBindingManager {
        SchemaBindingManager::new(definition(columns), None).unwrap()
    }

    #[test]
    fn table_update_publishes_a_new_binding() {
        let manager = manager(&[("a", ColumnType::Text)]);
        let before = manager.current();

        let outcome = manager.handle_event(&SchemaChangeEvent::table(
            SchemaChange::Updated,
            definition(&[("a", ColumnType::Text), ("b", ColumnType::Int)]),
        ));

        assert_eq!(outcome, SchemaEventOutcome::Rebuilt { generation: 2 });
        let after = manager.current();
        assert_eq!(
            after.value_schema().field_names().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_ne!(before.fingerprint(), after.fingerprint());
        assert_eq!(
            before.value_schema().field_names().collect::<Vec<_>>(),
            vec!["a"]
        );
    }

    #[test]
    fn events_for_other_tables_and_elements_are_ignored() {
        let manager = manager(&[("a", ColumnType::Text)]);
        let other = TableDefinition::new(
            TableName::new("ks1", "other"),
            vec![ColumnDefinition::partition_key("id", ColumnType::Text)],
        );

        let events = [
            SchemaChangeEvent::table(SchemaChange::Updated, other),
            SchemaChangeEvent::new(
                SchemaChange::Created,
                SchemaElement::Function {
                    keyspace: "ks1".to_string(),
                    name: "f".to_string(),
                },
            ),
            SchemaChangeEvent::new(
                SchemaChange::Dropped,
                SchemaElement::Keyspace {
                    name: "ks2".to_string(),
                },
            ),
            SchemaChangeEvent::user_defined_type(SchemaChange::Updated, address(&["street"])),
        ];

        for event in &events {
            assert_eq!(manager.handle_event(event), SchemaEventOutcome::Ignored);
        }
        assert_eq!(manager.current().generation(), 1);
    }

    #[test]
    fn udt_update_rebuilds_from_the_last_definition() {
        let manager = SchemaBindingManager::new(
            definition(&[(
                "addr",
                ColumnType::Udt(Arc::new(address(&["street"]))),
            )]),
            None,
        )
        .unwrap();
        let before = manager.current();

        let outcome = manager.handle_event(&SchemaChangeEvent::user_defined_type(
            SchemaChange::Updated,
            address(&["street", "zip"]),
        ));

        assert_eq!(outcome, SchemaEventOutcome::Rebuilt { generation: 2 });
        let after = manager.current();
        assert!(after.shares_statement_with(&before));

        let Some(crate::types::FieldSchema {
            field_type: crate::types::FieldType::Struct(addr),
            ..
        }) = after.value_field("addr")
        else {
            panic!("expected a struct field");
        };
        assert_eq!(addr.field_names().collect::<Vec<_>>(), vec!["street", "zip"]);
    }

    #[test]
    fn unused_or_unchanged_types_are_ignored() {
        let manager = manager(&[("addr", ColumnType::Udt(Arc::new(address(&["street"]))))]);
        let phone = UdtDefinition {
            name: "phone".to_string(),
            ..address(&["number"])
        };

        let event = SchemaChangeEvent::user_defined_type(SchemaChange::Created, phone);
        let outcome = manager.handle_event(&event);
        assert_eq!(outcome, SchemaEventOutcome::Ignored);

        let outcome = manager.handle_event(&SchemaChangeEvent::user_defined_type(
            SchemaChange::Updated,
            address(&["street"]),
        ));
        assert_eq!(outcome, SchemaEventOutcome::Ignored);
        assert_eq!(manager.current().generation(), 1);
    }

    #[test]
    fn unusable_definition_keeps_previous_binding_and_degrades() {
        let manager = manager(&[("a", ColumnType::Text)]);

        let outcome = manager.handle_event(&SchemaChangeEvent::table(
            SchemaChange::Updated,
            definition(&[("a", ColumnType::Text), ("d", ColumnType::Duration)]),
        ));

        assert_eq!(outcome, SchemaEventOutcome::Degraded);
        assert_eq!(manager.current().generation(), 1);
        assert!(!manager.health().is_healthy());

        let outcome = manager.handle_event(&SchemaChangeEvent::table(
            SchemaChange::Updated,
            definition(&[("a", ColumnType::Text), ("b", ColumnType::Int)]),
        ));
        assert_eq!(outcome, SchemaEventOutcome::Rebuilt { generation: 2 });
        assert_eq!(manager.health(), SchemaHealth::Healthy);
    }

    #[test]
    fn dropping_the_table_degrades_health() {
        let manager = manager(&[("a", ColumnType::Text)]);

        let outcome = manager.handle_event(&SchemaChangeEvent::table(
            SchemaChange::Dropped,
            definition(&[("a", ColumnType::Text)]),
        ));

        assert_eq!(outcome, SchemaEventOutcome::Degraded);
        assert_eq!(
            manager.health(),
            SchemaHealth::Degraded {
                reason: "table ks1.table1 was dropped".to_string()
            }
        );
        assert_eq!(manager.current().generation(), 1);
    }
}
