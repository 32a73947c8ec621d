use std::sync::Arc;

use tokio::sync::Mutex;

use crate::checkpoint::{CheckpointStore, Positions};
use crate::error::RelayResult;
use crate::types::{NodeId, SourcePosition};

#[derive(Debug, Default)]
struct Inner {
    positions: Positions,
    /// Every stored position in call order.
    history: Vec<(Option<NodeId>, SourcePosition)>,
}

/// Checkpoint store keeping positions in memory. Positions are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `positions`, as if left by a previous run.
    pub fn with_positions(positions: Positions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                positions,
                history: Vec::new(),
            })),
        }
    }

    pub async fn positions(&self) -> Positions {
        self.inner.lock().await.positions.clone()
    }

    pub async fn history(&self) -> Vec<(Option<NodeId>, SourcePosition)> {
        self.inner.lock().await.history.clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load_positions(&self) -> RelayResult<Positions> {
        Ok(self.positions().await)
    }

    async fn store_position(
        &self,
        origin: Option<NodeId>,
        position: SourcePosition,
    ) -> RelayResult<()> {
        let mut inner = self.inner.lock().await;
        inner.positions.insert(origin, position);
        inner.history.push((origin, position));

        Ok(())
    }
}
