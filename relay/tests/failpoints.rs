#![cfg(all(feature = "test-utils", feature = "failpoints"))]

use relay::checkpoint::{MemoryCheckpointStore, Positions};
use relay::error::ErrorKind;
use relay::failpoints::{RECONCILE_BEFORE_CHECKPOINT_FLUSH, RECONCILE_BEFORE_EMIT};
use relay::test_utils::failpoints::FailpointScenario;
use relay::test_utils::notice::{node, notice};
use relay::test_utils::pipeline::{create_loop, test_config};
use relay::test_utils::source::ScriptedSourceClient;
use relay::test_utils::table::{keyed_row, single_key_definition};
use relay::types::{ColumnType, SourcePosition};
use telemetry::init_test_tracing;

async fn client_with_row() -> ScriptedSourceClient {
    let client =
        ScriptedSourceClient::with_table(single_key_definition(&[("a", ColumnType::Text)]));
    client.put_row("k1", keyed_row("k1", &[("a", "v1")])).await;
    client
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_emit_drops_the_notice_without_checkpointing_it() {
    init_test_tracing();

    let scenario = FailpointScenario::setup(&[(RECONCILE_BEFORE_EMIT, "return(emit)")]);
    let store = MemoryCheckpointStore::new();
    let mut fixture = create_loop(test_config(), client_with_row().await, store.clone()).await;

    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![notice("k1", "d1", node(1), 1)])
        .await
        .unwrap();

    assert_eq!(outcome.dropped, 1);
    assert!(fixture.event_log.records().await.is_empty());
    assert!(store.positions().await.is_empty());

    // Nothing was cached, so a redelivered notice is reconciled once emitting works again.
    scenario.disable(RECONCILE_BEFORE_EMIT);
    let outcome = fixture
        .reconciliation_loop
        .process_batch(vec![notice("k1", "d1", node(2), 4)])
        .await
        .unwrap();

    assert_eq!(outcome.emitted, 1);
    assert_eq!(fixture.event_log.records().await.len(), 1);
    assert_eq!(
        store.positions().await,
        Positions::from([(Some(node(2)), SourcePosition::new(4))])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_checkpoint_flush_fails_the_batch() {
    init_test_tracing();

    let _scenario =
        FailpointScenario::setup(&[(RECONCILE_BEFORE_CHECKPOINT_FLUSH, "return(checkpoint)")]);
    let store = MemoryCheckpointStore::new();
    let mut fixture = create_loop(test_config(), client_with_row().await, store.clone()).await;

    let err = fixture
        .reconciliation_loop
        .process_batch(vec![notice("k1", "d1", node(1), 1)])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CheckpointIoError);
    assert_eq!(fixture.event_log.records().await.len(), 1);
    assert!(store.positions().await.is_empty());
    assert_eq!(
        fixture.reconciliation_loop.checkpoint().pending(),
        vec![Some(node(1))]
    );
}
