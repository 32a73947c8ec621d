use std::sync::Arc;

use config::shared::RelayConfig;
use tracing::{error, info};

use crate::bail;
use crate::checkpoint::CheckpointStore;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::destination::EventLog;
use crate::error::{ErrorKind, RelayResult};
use crate::notices::NoticeSource;
use crate::schema::SchemaBindingManager;
use crate::source::SourceClient;
use crate::types::TableName;
use crate::workers::reconcile::{LoopPhase, ReconcileWorker, ReconcileWorkerHandle};

#[derive(Debug)]
enum PipelineState<N> {
    NotStarted {
        notices: N,
    },
    Started {
        schema: SchemaBindingManager,
        worker: ReconcileWorkerHandle,
    },
    /// Start was attempted and failed; the notice source is gone.
    Failed,
}

/// Relay of one watched table: wires the notice source, source client, event log and
/// checkpoint store to a reconcile worker.
#[derive(Debug)]
pub struct Pipeline<N, C, L, S> {
    config: Arc<RelayConfig>,
    client: C,
    event_log: L,
    checkpoint_store: S,
    state: PipelineState<N>,
    shutdown_tx: ShutdownTx,
}

impl<N, C, L, S> Pipeline<N, C, L, S>
where
    N: NoticeSource + Send + 'static,
    C: SourceClient + Clone + Send + Sync + 'static,
    L: EventLog + Clone + Send + Sync + 'static,
    S: CheckpointStore + Clone + Send + 'static,
{
    pub fn new(
        config: RelayConfig,
        notices: N,
        client: C,
        event_log: L,
        checkpoint_store: S,
    ) -> Self {
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            config: Arc::new(config),
            client,
            event_log,
            checkpoint_store,
            state: PipelineState::NotStarted { notices },
            shutdown_tx,
        }
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Schema manager of the watched table, available once started.
    ///
    /// Schema change events of the source client are delivered to
    /// [`SchemaBindingManager::handle_event`].
    pub fn schema(&self) -> Option<&SchemaBindingManager> {
        match &self.state {
            PipelineState::Started { schema, .. } => Some(schema),
            _ => None,
        }
    }

    pub fn phase(&self) -> Option<LoopPhase> {
        match &self.state {
            PipelineState::Started { worker, .. } => Some(worker.phase()),
            _ => None,
        }
    }

    /// Validates the configuration, binds the watched table and starts reconciling.
    ///
    /// Fails with [`ErrorKind::MissingTable`] when the table does not exist and with
    /// [`ErrorKind::UnsupportedColumnType`] when its columns cannot be represented.
    pub async fn start(&mut self) -> RelayResult<()> {
        let table = TableName::new(&self.config.keyspace, &self.config.table);
        info!(%table, topic = %self.config.data_topic(), "starting relay");

        self.config.validate()?;
        let column_pattern = self.config.column_pattern()?;

        let notices = match std::mem::replace(&mut self.state, PipelineState::Failed) {
            PipelineState::NotStarted { notices } => notices,
            started @ PipelineState::Started { .. } => {
                self.state = started;
                bail!(ErrorKind::InvalidState, "Relay was already started");
            }
            PipelineState::Failed => {
                bail!(ErrorKind::InvalidState, "Relay failed to start before");
            }
        };

        let schema = SchemaBindingManager::load(&self.client, table, column_pattern).await?;

        let worker = ReconcileWorker::new(
            self.config.clone(),
            notices,
            self.client.clone(),
            self.event_log.clone(),
            schema.clone(),
            self.checkpoint_store.clone(),
            self.shutdown_tx.subscribe(),
        )
        .spawn()
        .await?;

        self.state = PipelineState::Started { schema, worker };

        Ok(())
    }

    pub async fn wait(self) -> RelayResult<()> {
        let PipelineState::Started { worker, .. } = self.state else {
            info!("relay was not started, nothing to wait for");

            return Ok(());
        };

        info!("waiting for reconcile worker to complete");

        worker.wait().await
    }

    pub fn shutdown(&self) {
        info!("trying to shut down the relay");

        if let Err(err) = self.shutdown_tx.shutdown() {
            error!("failed to send shutdown signal to the relay: {}", err);
            return;
        }

        info!("shut down signal successfully sent to the reconcile worker");
    }

    pub async fn shutdown_and_wait(self) -> RelayResult<()> {
        self.shutdown();
        self.wait().await
    }
}
