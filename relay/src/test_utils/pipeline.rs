use std::sync::Arc;

use config::shared::RelayConfig;

use crate::checkpoint::{CheckpointStore, OffsetCheckpoint};
use crate::destination::memory::MemoryEventLog;
use crate::notices::{ChannelNoticeSource, NoticeSender};
use crate::pipeline::Pipeline;
use crate::schema::SchemaBindingManager;
use crate::test_utils::source::ScriptedSourceClient;
use crate::test_utils::table::{KEYSPACE, TABLE, table_name};
use crate::workers::reconcile::ReconciliationLoop;

pub type TestLoop<S> =
    ReconciliationLoop<ChannelNoticeSource, ScriptedSourceClient, MemoryEventLog, S>;

pub type TestPipeline<S> = Pipeline<ChannelNoticeSource, ScriptedSourceClient, MemoryEventLog, S>;

/// Relay configuration for `ks1.table1` with test-friendly batching.
pub fn test_config() -> RelayConfig {
    let mut config = RelayConfig::new(KEYSPACE, TABLE);
    config.batch.max_size = 10;
    config.batch.max_fill_ms = 50;
    config.read_timeout_ms = 200;
    config
}

/// Everything a test needs to drive a reconciliation loop directly.
pub struct LoopFixture<S> {
    pub reconciliation_loop: TestLoop<S>,
    pub notices_tx: NoticeSender,
    pub event_log: MemoryEventLog,
    pub schema: SchemaBindingManager,
}

/// Builds a loop over `client`, binding `ks1.table1` and loading checkpoints from `store`.
///
/// # Panics
///
/// Panics when the table is missing from `client` or the checkpoints cannot be loaded.
pub async fn create_loop<S>(
    config: RelayConfig,
    client: ScriptedSourceClient,
    store: S,
) -> LoopFixture<S>
where
    S: CheckpointStore + Send,
{
    let column_pattern = config.column_pattern().unwrap();
    let schema = SchemaBindingManager::load(&client, table_name(), column_pattern)
        .await
        .unwrap();
    let checkpoint = OffsetCheckpoint::load(store).await.unwrap();

    let (notices_tx, notices) = ChannelNoticeSource::new();
    let event_log = MemoryEventLog::new();
    let reconciliation_loop = ReconciliationLoop::new(
        Arc::new(config),
        notices,
        client,
        event_log.clone(),
        schema.clone(),
        checkpoint,
    );

    LoopFixture {
        reconciliation_loop,
        notices_tx,
        event_log,
        schema,
    }
}

/// Builds a pipeline fed through the returned sender.
pub fn create_pipeline<S>(
    config: RelayConfig,
    client: ScriptedSourceClient,
    event_log: MemoryEventLog,
    store: S,
) -> (TestPipeline<S>, NoticeSender)
where
    S: CheckpointStore + Clone + Send + 'static,
{
    let (notices_tx, notices) = ChannelNoticeSource::new();
    let pipeline = Pipeline::new(config, notices, client, event_log, store);

    (pipeline, notices_tx)
}
