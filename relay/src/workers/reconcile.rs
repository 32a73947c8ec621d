use std::sync::Arc;

use config::shared::RelayConfig;
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{Instrument, debug, error, info, warn};

use crate::cache::DigestDedupCache;
use crate::checkpoint::{CheckpointStore, OffsetCheckpoint, Positions};
use crate::concurrency::shutdown::ShutdownRx;
use crate::destination::EventLog;
use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::failpoints::{
    RECONCILE_BEFORE_CHECKPOINT_FLUSH, RECONCILE_BEFORE_EMIT, relay_fail_point,
};
use crate::metrics::{
    RELAY_NOTICES_DROPPED_TOTAL, RELAY_NOTICES_DUPLICATE_TOTAL, RELAY_NOTICES_EMITTED_TOTAL,
    TABLE_LABEL, register_metrics,
};
use crate::notices::NoticeSource;
use crate::reader::{ConsistencyEscalatingReader, ReadBack};
use crate::relay_error;
use crate::schema::SchemaBindingManager;
use crate::source::SourceClient;
use crate::types::{CacheKey, ChangeNotice, OutputRecord};

/// What the reconciliation loop is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Starting,
    Idle,
    FetchingNotices,
    Processing,
    Stopped,
}

/// Fate of one change notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeOutcome {
    /// The row was read back and a record emitted.
    Emitted,
    /// Its digest was already processed for the row.
    Duplicate,
    /// It is at or before the checkpoint recovered at startup.
    Replayed,
    /// It could not be reconciled and was skipped.
    Dropped,
}

/// Counts of notice outcomes within one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub emitted: usize,
    pub duplicates: usize,
    pub replayed: usize,
    pub dropped: usize,
    /// Notices left unprocessed because shutdown was requested mid-batch.
    pub unprocessed: usize,
}

impl BatchOutcome {
    fn record(&mut self, outcome: NoticeOutcome) {
        match outcome {
            NoticeOutcome::Emitted => self.emitted += 1,
            NoticeOutcome::Duplicate => self.duplicates += 1,
            NoticeOutcome::Replayed => self.replayed += 1,
            NoticeOutcome::Dropped => self.dropped += 1,
        }
    }
}

/// Turns change notices of the watched table into records on the event log.
///
/// For each notice the loop skips digests it already processed for the row, reads the row
/// back under the current schema binding, emits a record with the row's current content and
/// marks the notice position. Marked positions are flushed after every batch.
#[derive(Debug)]
pub struct ReconciliationLoop<N, C, L, S> {
    config: Arc<RelayConfig>,
    notices: N,
    reconciler: Reconciler<C, L>,
    cache: DigestDedupCache<CacheKey>,
    checkpoint: OffsetCheckpoint<S>,
    /// Positions flushed by a previous run, notices up to them are not reconciled again.
    resume_positions: Positions,
    phase_tx: watch::Sender<LoopPhase>,
}

impl<N, C, L, S> ReconciliationLoop<N, C, L, S>
where
    N: NoticeSource + Send,
    C: SourceClient + Sync,
    L: EventLog + Sync,
    S: CheckpointStore + Send,
{
    pub fn new(
        config: Arc<RelayConfig>,
        notices: N,
        client: C,
        event_log: L,
        schema: SchemaBindingManager,
        checkpoint: OffsetCheckpoint<S>,
    ) -> Self {
        register_metrics();

        let (phase_tx, _) = watch::channel(LoopPhase::Starting);

        Self {
            reconciler: Reconciler {
                config: config.clone(),
                topic: config.data_topic(),
                reader: ConsistencyEscalatingReader::new(client, config.read_timeout()),
                event_log,
                schema,
            },
            cache: DigestDedupCache::from_config(&config.cache),
            resume_positions: checkpoint.flushed_positions().clone(),
            config,
            notices,
            checkpoint,
            phase_tx,
        }
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<LoopPhase> {
        self.phase_tx.subscribe()
    }

    pub fn checkpoint(&self) -> &OffsetCheckpoint<S> {
        &self.checkpoint
    }

    pub fn notices(&self) -> &N {
        &self.notices
    }

    /// Tells the notice source where to resume from.
    pub async fn recover(&mut self) -> RelayResult<()> {
        info!(
            origins = self.resume_positions.len(),
            "resuming after checkpointed positions"
        );

        self.notices.resume_after(&self.resume_positions).await
    }

    /// Runs until shutdown is requested or a fatal error occurs.
    ///
    /// Fetching waits at most the batch fill time. Per-notice failures drop the notice;
    /// failing to fetch notices or to flush checkpoints ends the loop with an error.
    pub async fn run(mut self, mut shutdown_rx: ShutdownRx) -> RelayResult<()> {
        self.recover().await?;

        let max_fill = self.config.batch.max_fill();
        let max_size = self.config.batch.max_size;

        loop {
            self.phase_tx.send_replace(LoopPhase::FetchingNotices);

            let fetched = tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    info!("shutting down reconciliation loop");
                    break;
                }

                fetched = timeout(max_fill, self.notices.fetch(max_size)) => fetched,
            };

            let notices = match fetched {
                Ok(notices) => notices?,
                Err(_) => {
                    self.phase_tx.send_replace(LoopPhase::Idle);
                    continue;
                }
            };

            self.phase_tx.send_replace(LoopPhase::Processing);
            let outcome = self.process(notices, Some(&shutdown_rx)).await?;
            self.phase_tx.send_replace(LoopPhase::Idle);

            if outcome.unprocessed > 0 {
                info!(
                    unprocessed = outcome.unprocessed,
                    "shutting down reconciliation loop before the end of the batch"
                );
                break;
            }
        }

        self.phase_tx.send_replace(LoopPhase::Stopped);
        self.reconciler.event_log.shutdown().await
    }

    /// Processes a batch of notices in order, then flushes the checkpoints they advanced.
    ///
    /// Fails only when checkpoints cannot be flushed.
    pub async fn process_batch(&mut self, notices: Vec<ChangeNotice>) -> RelayResult<BatchOutcome> {
        self.process(notices, None).await
    }

    async fn process(
        &mut self,
        notices: Vec<ChangeNotice>,
        shutdown_rx: Option<&ShutdownRx>,
    ) -> RelayResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let total = notices.len();

        for (index, notice) in notices.into_iter().enumerate() {
            if shutdown_rx.is_some_and(|rx| rx.has_changed().unwrap_or(true)) {
                outcome.unprocessed = total - index;
                break;
            }

            outcome.record(self.process_notice(notice).await);
        }

        self.flush_checkpoints().await.map_err(|err| {
            relay_error!(
                ErrorKind::CheckpointIoError,
                "Failed to flush checkpoints",
                source: err
            )
        })?;

        debug!(
            emitted = outcome.emitted,
            duplicates = outcome.duplicates,
            replayed = outcome.replayed,
            dropped = outcome.dropped,
            "processed batch"
        );

        Ok(outcome)
    }

    async fn flush_checkpoints(&mut self) -> RelayResult<usize> {
        relay_fail_point(RECONCILE_BEFORE_CHECKPOINT_FLUSH)?;
        self.checkpoint.flush_pending().await
    }

    /// Reconciles one notice. Never fails; unreconcilable notices are logged and dropped.
    pub async fn process_notice(&mut self, notice: ChangeNotice) -> NoticeOutcome {
        let origin = Some(notice.origin);
        let table = self.reconciler.schema.table().to_string();

        if let Some(resume) = self.resume_positions.get(&origin)
            && notice.position <= *resume
        {
            debug!(
                origin = %notice.origin,
                position = %notice.position,
                "skipping notice at or before the recovered checkpoint"
            );
            return NoticeOutcome::Replayed;
        }

        let cache_key = match notice.key.cache_key() {
            Ok(cache_key) => cache_key,
            Err(err) => return drop_notice(&notice, &err, table),
        };
        if self.cache.seen(&cache_key, &notice.digest) {
            debug!(digest = %notice.digest, origin = %notice.origin, "skipping duplicate mutation");
            counter!(RELAY_NOTICES_DUPLICATE_TOTAL, TABLE_LABEL => table).increment(1);
            self.checkpoint.mark_position(origin, notice.position);

            return NoticeOutcome::Duplicate;
        }

        let span = tracing::debug_span!(
            "reconcile_notice",
            digest = %notice.digest,
            origin = %notice.origin,
            position = %notice.position,
        );
        match self.reconciler.reconcile(&notice).instrument(span).await {
            Ok(read) => {
                if self.reconciler.should_cache(&notice, &read) {
                    self.cache.record(cache_key, notice.digest.clone());
                }
                self.checkpoint.mark_position(origin, notice.position);
                counter!(RELAY_NOTICES_EMITTED_TOTAL, TABLE_LABEL => table).increment(1);

                NoticeOutcome::Emitted
            }
            Err(err) => drop_notice(&notice, &err, table),
        }
    }
}

fn drop_notice(notice: &ChangeNotice, err: &RelayError, table: String) -> NoticeOutcome {
    error!(
        key = ?notice.key,
        digest = %notice.digest,
        origin = %notice.origin,
        position = %notice.position,
        error = %err,
        "dropping change notice that could not be reconciled"
    );
    counter!(
        RELAY_NOTICES_DROPPED_TOTAL,
        TABLE_LABEL => table,
        "error_kind" => format!("{:?}", err.kind())
    )
    .increment(1);

    NoticeOutcome::Dropped
}

/// Read-only half of the loop: reads a notice's row back and emits its record.
#[derive(Debug)]
struct Reconciler<C, L> {
    config: Arc<RelayConfig>,
    topic: String,
    reader: ConsistencyEscalatingReader<C>,
    event_log: L,
    schema: SchemaBindingManager,
}

impl<C, L> Reconciler<C, L>
where
    C: SourceClient + Sync,
    L: EventLog + Sync,
{
    async fn reconcile(&self, notice: &ChangeNotice) -> RelayResult<ReadBack> {
        // The binding taken here is used for the whole notice, even if a newer one is
        // published meanwhile.
        let binding = self.schema.current();

        let key_values = binding.key_values(&notice.key)?;
        let read = self
            .reader
            .read(
                &binding,
                &key_values,
                &notice.digest,
                &self.config.consistency_ladder,
            )
            .await?;

        let record = OutputRecord {
            topic: self.topic.clone(),
            partition: notice.partition,
            key: binding.convert_key(&key_values)?,
            key_schema: binding.key_schema().clone(),
            value: binding.convert_row(read.row.as_ref())?,
            value_schema: binding.value_schema().clone(),
        };

        relay_fail_point(RECONCILE_BEFORE_EMIT)?;
        self.event_log.emit(record).await.map_err(|err| {
            relay_error!(
                ErrorKind::EventLogEmitFailed,
                "Failed to emit the reconciled record",
                format!("event log `{}`", L::name()),
                source: err
            )
        })?;

        debug!(
            consistency = %read.consistency,
            generation = binding.generation(),
            delete = read.row.is_none(),
            "emitted reconciled record"
        );

        Ok(read)
    }

    fn should_cache(&self, notice: &ChangeNotice, read: &ReadBack) -> bool {
        if !self.config.cache_only_if_coordinator_match {
            return true;
        }

        let matched = read.coordinator == Some(notice.origin);
        if !matched {
            warn!(
                digest = %notice.digest,
                origin = %notice.origin,
                coordinator = ?read.coordinator,
                "not caching digest, read-back was not coordinated by the origin node"
            );
        }

        matched
    }
}

/// Handle on a spawned [`ReconcileWorker`].
#[derive(Debug)]
pub struct ReconcileWorkerHandle {
    handle: Option<JoinHandle<RelayResult<()>>>,
    phase_rx: watch::Receiver<LoopPhase>,
}

impl ReconcileWorkerHandle {
    pub fn phase(&self) -> LoopPhase {
        *self.phase_rx.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<LoopPhase> {
        self.phase_rx.clone()
    }

    /// Waits for the worker to finish and returns its result.
    pub async fn wait(mut self) -> RelayResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|err| {
            if err.is_cancelled() {
                relay_error!(
                    ErrorKind::ReconcileWorkerCancelled,
                    "Reconcile worker was cancelled",
                    err
                )
            } else {
                relay_error!(
                    ErrorKind::ReconcileWorkerPanic,
                    "Reconcile worker panicked",
                    err
                )
            }
        })??;

        Ok(())
    }
}

/// Background task running a [`ReconciliationLoop`].
#[derive(Debug)]
pub struct ReconcileWorker<N, C, L, S> {
    config: Arc<RelayConfig>,
    notices: N,
    client: C,
    event_log: L,
    schema: SchemaBindingManager,
    checkpoint_store: S,
    shutdown_rx: ShutdownRx,
}

impl<N, C, L, S> ReconcileWorker<N, C, L, S>
where
    N: NoticeSource + Send + 'static,
    C: SourceClient + Send + Sync + 'static,
    L: EventLog + Send + Sync + 'static,
    S: CheckpointStore + Send + 'static,
{
    pub fn new(
        config: Arc<RelayConfig>,
        notices: N,
        client: C,
        event_log: L,
        schema: SchemaBindingManager,
        checkpoint_store: S,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            config,
            notices,
            client,
            event_log,
            schema,
            checkpoint_store,
            shutdown_rx,
        }
    }

    /// Loads checkpoints, then runs the loop on a new task.
    pub async fn spawn(self) -> RelayResult<ReconcileWorkerHandle> {
        info!("starting reconcile worker");

        let checkpoint = OffsetCheckpoint::load(self.checkpoint_store).await?;
        let reconciliation_loop = ReconciliationLoop::new(
            self.config.clone(),
            self.notices,
            self.client,
            self.event_log,
            self.schema,
            checkpoint,
        );
        let phase_rx = reconciliation_loop.subscribe_phase();

        let span = tracing::info_span!(
            "reconcile_worker",
            keyspace = %self.config.keyspace,
            table = %self.config.table,
        );
        let handle = tokio::spawn(reconciliation_loop.run(self.shutdown_rx).instrument(span));

        Ok(ReconcileWorkerHandle {
            handle: Some(handle),
            phase_rx,
        })
    }
}
