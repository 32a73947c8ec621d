#![cfg(feature = "test-utils")]

use std::sync::Arc;

use relay::checkpoint::MemoryCheckpointStore;
use relay::schema::{SchemaBindingManager, SchemaChange, SchemaChangeEvent, SchemaEventOutcome};
use relay::test_utils::notice::{node, notice};
use relay::test_utils::pipeline::{LoopFixture, create_loop, test_config};
use relay::test_utils::source::ScriptedSourceClient;
use relay::test_utils::table::{keyed_row, single_key_definition};
use relay::types::{Cell, ColumnType, FieldType, Row, UdtDefinition, Value};
use telemetry::init_test_tracing;

fn address(fields: &[(&str, ColumnType)]) -> UdtDefinition {
    UdtDefinition {
        keyspace: "ks1".to_string(),
        name: "address".to_string(),
        fields: fields
            .iter()
            .map(|(name, column_type)| (name.to_string(), column_type.clone()))
            .collect(),
    }
}

fn text(value: &str) -> Value {
    Value::String(value.to_string())
}

#[tokio::test(flavor = "multi_thread")]
async fn in_flight_notice_keeps_the_binding_it_started_with() {
    init_test_tracing();

    let client =
        ScriptedSourceClient::with_table(single_key_definition(&[("a", ColumnType::Text)]));
    client
        .put_row("k1", keyed_row("k1", &[("a", "v1"), ("b", "w1")]))
        .await;
    client
        .put_row("k2", keyed_row("k2", &[("a", "v2"), ("b", "w2")]))
        .await;
    let LoopFixture {
        mut reconciliation_loop,
        notices_tx: _notices_tx,
        event_log,
        schema,
    } = create_loop(test_config(), client.clone(), MemoryCheckpointStore::new()).await;

    let gate = client.gate_next_read().await;
    let in_flight = tokio::spawn(async move {
        let outcome = reconciliation_loop
            .process_batch(vec![notice("k1", "d1", node(1), 1)])
            .await
            .unwrap();
        (reconciliation_loop, outcome)
    });
    gate.wait_started().await;

    let outcome = schema.handle_event(&SchemaChangeEvent::table(
        SchemaChange::Updated,
        single_key_definition(&[("a", ColumnType::Text), ("b", ColumnType::Text)]),
    ));
    assert_eq!(outcome, SchemaEventOutcome::Rebuilt { generation: 2 });
    gate.release();

    let (mut reconciliation_loop, outcome) = in_flight.await.unwrap();
    assert_eq!(outcome.emitted, 1);
    reconciliation_loop
        .process_batch(vec![notice("k2", "d2", node(1), 2)])
        .await
        .unwrap();

    let records = event_log.records().await;
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].value_schema.field_names().collect::<Vec<_>>(),
        vec!["a"]
    );
    assert_eq!(
        records[0].value.as_ref().unwrap().field_names().collect::<Vec<_>>(),
        vec!["a"]
    );
    assert_eq!(
        records[1].value_schema.field_names().collect::<Vec<_>>(),
        vec!["a", "b"]
    );
    assert_eq!(records[1].value.as_ref().unwrap().get("b"), Some(&text("w2")));
    assert_eq!(
        client.prepared_queries().await,
        vec![
            "SELECT a FROM ks1.table1 WHERE id = ?".to_string(),
            "SELECT a, b FROM ks1.table1 WHERE id = ?".to_string(),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn type_change_reuses_the_prepared_statement() {
    init_test_tracing();

    let initial = Arc::new(address(&[("street", ColumnType::Text)]));
    let client = ScriptedSourceClient::with_table(single_key_definition(&[(
        "addr",
        ColumnType::Udt(initial),
    )]));
    let row: Row = [
        ("id", Cell::from("k1")),
        (
            "addr",
            Cell::Udt(vec![("street".to_string(), Cell::from("main"))]),
        ),
    ]
    .into_iter()
    .collect();
    client.put_row("k1", row).await;
    let mut fixture =
        create_loop(test_config(), client.clone(), MemoryCheckpointStore::new()).await;

    fixture
        .reconciliation_loop
        .process_batch(vec![notice("k1", "d1", node(1), 1)])
        .await
        .unwrap();
    let before = fixture.schema.current();

    let outcome = fixture.schema.handle_event(&SchemaChangeEvent::user_defined_type(
        SchemaChange::Updated,
        address(&[("street", ColumnType::Text), ("zip", ColumnType::Int)]),
    ));
    assert_eq!(outcome, SchemaEventOutcome::Rebuilt { generation: 2 });
    let after = fixture.schema.current();
    assert!(after.shares_statement_with(&before));
    assert!(after.is_prepared());

    fixture
        .reconciliation_loop
        .process_batch(vec![notice("k1", "d2", node(1), 2)])
        .await
        .unwrap();

    assert_eq!(client.prepared_queries().await.len(), 1);
    let records = fixture.event_log.records().await;
    let Some(FieldType::Struct(addr_schema)) = records[1]
        .value_schema
        .field("addr")
        .map(|field| field.field_type.clone())
    else {
        panic!("addr should be a struct field");
    };
    assert_eq!(addr_schema.field_names().collect::<Vec<_>>(), vec!["street", "zip"]);
    let Some(Value::Struct(addr)) = records[1].value.as_ref().unwrap().get("addr") else {
        panic!("addr should be a struct value");
    };
    assert_eq!(addr.get("street"), Some(&text("main")));
    assert_eq!(addr.get("zip"), Some(&Value::Null));
}

#[tokio::test(flavor = "multi_thread")]
async fn unusable_definition_degrades_health_and_keeps_the_binding() {
    init_test_tracing();

    let client =
        ScriptedSourceClient::with_table(single_key_definition(&[("a", ColumnType::Text)]));
    client.put_row("k1", keyed_row("k1", &[("a", "v1")])).await;
    let mut fixture =
        create_loop(test_config(), client, MemoryCheckpointStore::new()).await;
    let mut health_rx = fixture.schema.subscribe_health();

    let outcome = fixture.schema.handle_event(&SchemaChangeEvent::table(
        SchemaChange::Updated,
        single_key_definition(&[("a", ColumnType::Text), ("span", ColumnType::Duration)]),
    ));

    assert_eq!(outcome, SchemaEventOutcome::Degraded);
    assert!(health_rx.has_changed().unwrap());
    assert!(!health_rx.borrow_and_update().is_healthy());
    assert_eq!(fixture.schema.current().generation(), 1);

    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![notice("k1", "d1", node(1), 1)])
        .await
        .unwrap();
    assert_eq!(outcome.emitted, 1);
    let records = fixture.event_log.records().await;
    assert_eq!(
        records[0].value_schema.field_names().collect::<Vec<_>>(),
        vec!["a"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_table_degrades_until_recreated() {
    init_test_tracing();

    let schema =
        SchemaBindingManager::new(single_key_definition(&[("a", ColumnType::Text)]), None).unwrap();

    let outcome = schema.handle_event(&SchemaChangeEvent::table(
        SchemaChange::Dropped,
        single_key_definition(&[("a", ColumnType::Text)]),
    ));
    assert_eq!(outcome, SchemaEventOutcome::Degraded);
    insta::assert_debug_snapshot!(schema.health(), @r#"
    Degraded {
        reason: "table ks1.table1 was dropped",
    }
    "#);

    let outcome = schema.handle_event(&SchemaChangeEvent::user_defined_type(
        SchemaChange::Updated,
        address(&[("street", ColumnType::Text)]),
    ));
    assert_eq!(outcome, SchemaEventOutcome::Ignored);

    let outcome = schema.handle_event(&SchemaChangeEvent::table(
        SchemaChange::Created,
        single_key_definition(&[("a", ColumnType::Text), ("b", ColumnType::Int)]),
    ));
    assert_eq!(outcome, SchemaEventOutcome::Rebuilt { generation: 2 });
    assert!(schema.health().is_healthy());
}

#[tokio::test(flavor = "multi_thread")]
async fn readers_never_observe_a_partially_published_binding() {
    init_test_tracing();

    let schema =
        SchemaBindingManager::new(single_key_definition(&[("a", ColumnType::Text)]), None).unwrap();

    let publisher = {
        let schema = schema.clone();
        std::thread::spawn(move || {
            for round in 0..200 {
                let columns = if round % 2 == 0 {
                    vec![("a", ColumnType::Text), ("b", ColumnType::Int)]
                } else {
                    vec![("a", ColumnType::Text)]
                };
                schema.handle_event(&SchemaChangeEvent::table(
                    SchemaChange::Updated,
                    single_key_definition(&columns),
                ));
            }
        })
    };

    let mut last_generation = 0;
    loop {
        let finished = publisher.is_finished();

        let binding = schema.current();
        let projection = binding.value_schema().field_names().collect::<Vec<_>>().join(", ");
        assert!(
            binding
                .query()
                .text()
                .starts_with(&format!("SELECT {projection} FROM")),
            "query `{}` does not match value schema of generation {}",
            binding.query().text(),
            binding.generation()
        );
        assert_eq!(binding.value_columns().len(), binding.value_schema().fields.len());
        assert!(binding.generation() >= last_generation);
        last_generation = binding.generation();

        if finished {
            break;
        }
        tokio::task::yield_now().await;
    }

    publisher.join().unwrap();
    assert_eq!(schema.current().generation(), 201);
}
