use tracing::debug;

use crate::checkpoint::{CheckpointStore, Positions};
use crate::error::RelayResult;
use crate::types::{NodeId, SourcePosition};

/// Tracks the highest reconciled position per origin node and flushes it to a
/// [`CheckpointStore`].
///
/// Marked positions never move backwards. A position is durable once flushed.
#[derive(Debug)]
pub struct OffsetCheckpoint<S> {
    store: S,
    marked: Positions,
    flushed: Positions,
}

impl<S> OffsetCheckpoint<S>
where
    S: CheckpointStore,
{
    /// Loads the positions persisted by a previous run.
    pub async fn load(store: S) -> RelayResult<Self> {
        let flushed = store.load_positions().await?;
        debug!(origins = flushed.len(), "loaded checkpoints");

        Ok(Self {
            store,
            marked: flushed.clone(),
            flushed,
        })
    }

    /// Marks `position` as reconciled for `origin`.
    ///
    /// Returns whether the marked position advanced; older positions are ignored.
    pub fn mark_position(&mut self, origin: Option<NodeId>, position: SourcePosition) -> bool {
        match self.marked.get(&origin) {
            Some(current) if *current >= position => false,
            _ => {
                self.marked.insert(origin, position);
                true
            }
        }
    }

    /// Latest marked position of `origin`, flushed or not.
    pub fn position(&self, origin: Option<NodeId>) -> Option<SourcePosition> {
        self.marked.get(&origin).copied()
    }

    pub fn flushed_position(&self, origin: Option<NodeId>) -> Option<SourcePosition> {
        self.flushed.get(&origin).copied()
    }

    pub fn flushed_positions(&self) -> &Positions {
        &self.flushed
    }

    /// Origins whose marked position is ahead of the flushed one.
    pub fn pending(&self) -> Vec<Option<NodeId>> {
        self.marked
            .iter()
            .filter(|(origin, position)| self.flushed.get(*origin) != Some(*position))
            .map(|(origin, _)| *origin)
            .collect()
    }

    /// Persists the marked position of `origin`. Does nothing when there is none or it is
    /// already flushed.
    pub async fn flush(&mut self, origin: Option<NodeId>) -> RelayResult<()> {
        let Some(position) = self.position(origin) else {
            return Ok(());
        };
        if self.flushed_position(origin) == Some(position) {
            return Ok(());
        }

        self.store.store_position(origin, position).await?;
        self.flushed.insert(origin, position);

        Ok(())
    }

    /// Flushes every pending origin and returns how many were flushed.
    pub async fn flush_pending(&mut self) -> RelayResult<usize> {
        let pending = self.pending();
        for origin in &pending {
            self.flush(*origin).await?;
        }

        Ok(pending.len())
    }
}
