#![cfg(feature = "test-utils")]

use std::time::Duration;

use config::shared::{CheckpointStoreConfig, ConsistencyLevel};
use relay::checkpoint::{AnyCheckpointStore, MemoryCheckpointStore, Positions};
use relay::destination::memory::MemoryEventLog;
use relay::error::{ErrorKind, RelayResult};
use relay::notices::NoticeSource;
use relay::test_utils::notice::{node, notice};
use relay::test_utils::notify::TimedNotify;
use relay::test_utils::pipeline::{create_loop, create_pipeline, test_config};
use relay::test_utils::source::ScriptedSourceClient;
use relay::test_utils::table::{keyed_row, single_key_definition};
use relay::types::{ChangeNotice, ColumnType, SourcePosition, Value};
use relay::workers::reconcile::BatchOutcome;
use telemetry::init_test_tracing;

fn text(value: &str) -> Value {
    Value::String(value.to_string())
}

async fn client_with_row() -> ScriptedSourceClient {
    let client =
        ScriptedSourceClient::with_table(single_key_definition(&[("a", ColumnType::Text)]));
    client.put_row("k1", keyed_row("k1", &[("a", "v1")])).await;
    client
}

#[tokio::test(flavor = "multi_thread")]
async fn replicas_of_one_write_are_emitted_once() {
    init_test_tracing();

    let client = client_with_row().await;
    let store = MemoryCheckpointStore::new();
    let mut fixture = create_loop(test_config(), client.clone(), store.clone()).await;

    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![
            notice("k1", "d1", node(1), 10),
            notice("k1", "d1", node(2), 20),
            notice("k1", "d1", node(3), 30),
        ])
        .await
        .unwrap();

    assert_eq!(
        outcome,
        BatchOutcome {
            emitted: 1,
            duplicates: 2,
            ..Default::default()
        }
    );

    let records = fixture.event_log.records().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.topic, "data-ks1.table1");
    assert_eq!(record.partition, Some(0));
    assert_eq!(record.key, text("k1"));
    assert_eq!(record.value.as_ref().unwrap().get("a"), Some(&text("v1")));
    assert_eq!(client.reads().await.len(), 1);

    assert_eq!(
        store.positions().await,
        Positions::from([
            (Some(node(1)), SourcePosition::new(10)),
            (Some(node(2)), SourcePosition::new(20)),
            (Some(node(3)), SourcePosition::new(30)),
        ])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn distinct_mutations_of_a_row_are_each_emitted() {
    init_test_tracing();

    let client = client_with_row().await;
    let mut fixture =
        create_loop(test_config(), client.clone(), MemoryCheckpointStore::new()).await;

    fixture
        .reconciliation_loop
        .process_batch(vec![notice("k1", "d1", node(1), 1)])
        .await
        .unwrap();
    client.put_row("k1", keyed_row("k1", &[("a", "v2")])).await;
    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![
            notice("k1", "d2", node(1), 2),
            notice("k1", "d1", node(2), 7),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.emitted, 1);
    assert_eq!(outcome.duplicates, 1);

    let values: Vec<_> = fixture
        .event_log
        .records()
        .await
        .into_iter()
        .map(|record| record.value.unwrap().get("a").cloned())
        .collect();
    assert_eq!(values, vec![Some(text("v1")), Some(text("v2"))]);
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_row_is_emitted_without_value() {
    init_test_tracing();

    let client =
        ScriptedSourceClient::with_table(single_key_definition(&[("a", ColumnType::Text)]));
    let mut fixture =
        create_loop(test_config(), client, MemoryCheckpointStore::new()).await;

    fixture
        .reconciliation_loop
        .process_batch(vec![notice("k9", "d9", node(1), 1)])
        .await
        .unwrap();

    let records = fixture.event_log.records().await;
    assert_eq!(records.len(), 1);
    assert!(records[0].is_delete());
    assert_eq!(records[0].key, text("k9"));
    assert_eq!(records[0].value_schema.name, "ks1.table1");
    assert_eq!(
        records[0].value_schema.field_names().collect::<Vec<_>>(),
        vec!["a"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn consistency_ladder_is_walked_in_order_and_exhaustion_drops_the_notice() {
    init_test_tracing();

    let mut config = test_config();
    config.consistency_ladder = vec![
        ConsistencyLevel::Quorum,
        ConsistencyLevel::LocalQuorum,
        ConsistencyLevel::One,
    ];
    let client = client_with_row().await;
    client.put_row("k2", keyed_row("k2", &[("a", "v2")])).await;
    client.fail_at(ConsistencyLevel::Quorum).await;
    let store = MemoryCheckpointStore::new();
    let mut fixture = create_loop(config, client.clone(), store.clone()).await;

    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![notice("k1", "d1", node(1), 1)])
        .await
        .unwrap();
    assert_eq!(outcome.emitted, 1);
    assert_eq!(
        client.attempted_levels().await,
        vec![ConsistencyLevel::Quorum, ConsistencyLevel::LocalQuorum]
    );

    client.fail_at(ConsistencyLevel::LocalQuorum).await;
    client.fail_at(ConsistencyLevel::One).await;
    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![notice("k2", "d2", node(2), 5)])
        .await
        .unwrap();
    assert_eq!(outcome.dropped, 1);
    assert_eq!(fixture.event_log.records().await.len(), 1);
    assert_eq!(store.positions().await.get(&Some(node(2))), None);

    client.clear_failures().await;
    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![notice("k2", "d2", node(2), 5)])
        .await
        .unwrap();
    assert_eq!(outcome.emitted, 1);
    assert_eq!(
        store.positions().await.get(&Some(node(2))),
        Some(&SourcePosition::new(5))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn timed_out_reads_step_down_the_ladder() {
    init_test_tracing();

    let client = client_with_row().await;
    client.hang_at(ConsistencyLevel::LocalQuorum).await;
    let mut fixture =
        create_loop(test_config(), client.clone(), MemoryCheckpointStore::new()).await;

    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![notice("k1", "d1", node(1), 1)])
        .await
        .unwrap();

    assert_eq!(outcome.emitted, 1);
    assert_eq!(
        client.attempted_levels().await,
        vec![ConsistencyLevel::LocalQuorum, ConsistencyLevel::LocalOne]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn digests_are_cached_only_for_matching_coordinators_when_configured() {
    init_test_tracing();

    let mut config = test_config();
    config.cache_only_if_coordinator_match = true;
    let client = client_with_row().await;
    client.set_coordinator(Some(node(9))).await;
    let mut fixture = create_loop(config, client.clone(), MemoryCheckpointStore::new()).await;

    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![
            notice("k1", "d1", node(1), 1),
            notice("k1", "d1", node(2), 1),
        ])
        .await
        .unwrap();
    assert_eq!(outcome.emitted, 2);

    client.set_coordinator(Some(node(3))).await;
    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![
            notice("k1", "d2", node(3), 2),
            notice("k1", "d2", node(4), 2),
        ])
        .await
        .unwrap();
    assert_eq!(outcome.emitted, 1);
    assert_eq!(outcome.duplicates, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn recovery_skips_notices_at_or_before_the_checkpoint() {
    init_test_tracing();

    let positions = Positions::from([(Some(node(1)), SourcePosition::new(5))]);
    let store = MemoryCheckpointStore::with_positions(positions.clone());
    let client = client_with_row().await;
    let mut fixture = create_loop(test_config(), client, store.clone()).await;

    fixture.reconciliation_loop.recover().await.unwrap();
    assert_eq!(
        fixture.reconciliation_loop.notices().resumed_from(),
        Some(&positions)
    );

    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![
            notice("k1", "d1", node(1), 3),
            notice("k1", "d2", node(1), 5),
            notice("k1", "d3", node(1), 6),
            notice("k1", "d4", node(2), 1),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.replayed, 2);
    assert_eq!(outcome.emitted, 2);
    assert_eq!(
        store.positions().await,
        Positions::from([
            (Some(node(1)), SourcePosition::new(6)),
            (Some(node(2)), SourcePosition::new(1)),
        ])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn file_checkpoints_survive_a_restart() {
    init_test_tracing();

    let directory = tempfile::tempdir().unwrap();
    let checkpoint_config = CheckpointStoreConfig::File {
        path: directory.path().join("offsets.json"),
    };
    let client = client_with_row().await;

    let mut first = create_loop(
        test_config(),
        client.clone(),
        AnyCheckpointStore::from_config(&checkpoint_config),
    )
    .await;
    first
        .reconciliation_loop
        .process_batch(vec![
            notice("k1", "d1", node(1), 1),
            notice("k1", "d2", node(2), 2),
        ])
        .await
        .unwrap();
    drop(first);

    let mut second = create_loop(
        test_config(),
        client,
        AnyCheckpointStore::from_config(&checkpoint_config),
    )
    .await;
    let outcome = second
        .reconciliation_loop
        .process_batch(vec![
            notice("k1", "d1", node(1), 1),
            notice("k1", "d2", node(2), 2),
            notice("k1", "d3", node(1), 3),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.replayed, 2);
    assert_eq!(outcome.emitted, 1);
    assert_eq!(
        second
            .reconciliation_loop
            .checkpoint()
            .flushed_position(Some(node(1))),
        Some(SourcePosition::new(3))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn column_pattern_limits_the_emitted_columns() {
    init_test_tracing();

    let mut config = test_config();
    config.columns_regexp = Some("a|c".to_string());
    let client = ScriptedSourceClient::with_table(single_key_definition(&[
        ("a", ColumnType::Text),
        ("b", ColumnType::Text),
        ("c", ColumnType::Text),
    ]));
    client
        .put_row("k1", keyed_row("k1", &[("a", "1"), ("b", "2"), ("c", "3")]))
        .await;
    let mut fixture = create_loop(config, client.clone(), MemoryCheckpointStore::new()).await;

    fixture
        .reconciliation_loop
        .process_batch(vec![notice("k1", "d1", node(1), 1)])
        .await
        .unwrap();

    let records = fixture.event_log.records().await;
    let value = records[0].value.as_ref().unwrap();
    assert_eq!(value.field_names().collect::<Vec<_>>(), vec!["a", "c"]);
    assert_eq!(
        client.prepared_queries().await,
        vec!["SELECT a, c FROM ks1.table1 WHERE id = ?".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_reconciles_until_shut_down() {
    init_test_tracing();

    let client = client_with_row().await;
    client.put_row("k2", keyed_row("k2", &[("a", "v2")])).await;
    let event_log = MemoryEventLog::new();
    let store = MemoryCheckpointStore::new();
    let (mut pipeline, notices_tx) =
        create_pipeline(test_config(), client, event_log.clone(), store.clone());

    pipeline.start().await.unwrap();
    let err = pipeline.start().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(pipeline.schema().unwrap().health().is_healthy());

    let two_records = TimedNotify::new(event_log.notify_on_record_count(2).await);
    notices_tx.send(notice("k1", "d1", node(1), 1)).unwrap();
    notices_tx.send(notice("k1", "d1", node(2), 1)).unwrap();
    notices_tx.send(notice("k2", "d2", node(1), 2)).unwrap();
    two_records.notified().await;

    pipeline.shutdown_and_wait().await.unwrap();

    assert_eq!(event_log.records().await.len(), 2);
    assert!(event_log.is_shut_down().await);
    assert_eq!(
        store.positions().await,
        Positions::from([
            (Some(node(1)), SourcePosition::new(2)),
            (Some(node(2)), SourcePosition::new(1)),
        ])
    );
    drop(notices_tx);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_interrupts_a_blocked_fetch() {
    init_test_tracing();

    let mut config = test_config();
    config.batch.max_fill_ms = 600_000;
    let event_log = MemoryEventLog::new();
    let (mut pipeline, notices_tx) = create_pipeline(
        config,
        client_with_row().await,
        event_log.clone(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();

    let one_record = TimedNotify::new(event_log.notify_on_record_count(1).await);
    notices_tx.send(notice("k1", "d1", node(1), 1)).unwrap();
    one_record.notified().await;

    // The loop is now waiting on an empty notice source with a fill time far above the
    // timeout below.
    tokio::time::timeout(Duration::from_secs(5), pipeline.shutdown_and_wait())
        .await
        .expect("the relay did not stop while waiting for notices")
        .unwrap();

    assert!(event_log.is_shut_down().await);
    drop(notices_tx);
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_fails_to_start_without_the_watched_table() {
    init_test_tracing();

    let (mut pipeline, _notices_tx) = create_pipeline(
        test_config(),
        ScriptedSourceClient::new(),
        MemoryEventLog::new(),
        MemoryCheckpointStore::new(),
    );

    let err = pipeline.start().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingTable);
    assert!(pipeline.schema().is_none());
    pipeline.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn closed_notice_source_ends_the_pipeline_with_an_error() {
    init_test_tracing();

    let (mut pipeline, notices_tx) = create_pipeline(
        test_config(),
        client_with_row().await,
        MemoryEventLog::new(),
        MemoryCheckpointStore::new(),
    );
    pipeline.start().await.unwrap();
    drop(notices_tx);

    let err = pipeline.wait().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoticeSourceFailed);
}

#[tokio::test]
async fn resume_after_defaults_to_a_no_op() {
    struct EmptySource;

    impl NoticeSource for EmptySource {
        async fn fetch(&mut self, _max_notices: usize) -> RelayResult<Vec<ChangeNotice>> {
            Ok(Vec::new())
        }
    }

    let mut source = EmptySource;
    source.resume_after(&Positions::new()).await.unwrap();
    assert!(source.fetch(1).await.unwrap().is_empty());
}
