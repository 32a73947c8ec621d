use config::shared::CheckpointStoreConfig;

use crate::checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, Positions};
use crate::error::RelayResult;
use crate::types::{NodeId, SourcePosition};

/// Checkpoint store selected by configuration.
#[derive(Debug, Clone)]
pub enum AnyCheckpointStore {
    Memory(MemoryCheckpointStore),
    File(FileCheckpointStore),
}

impl AnyCheckpointStore {
    pub fn from_config(config: &CheckpointStoreConfig) -> Self {
        match config {
            CheckpointStoreConfig::Memory => {
                AnyCheckpointStore::Memory(MemoryCheckpointStore::new())
            }
            CheckpointStoreConfig::File { path } => {
                AnyCheckpointStore::File(FileCheckpointStore::new(path.clone()))
            }
        }
    }
}

impl CheckpointStore for AnyCheckpointStore {
    async fn load_positions(&self) -> RelayResult<Positions> {
        match self {
            AnyCheckpointStore::Memory(store) => store.load_positions().await,
            AnyCheckpointStore::File(store) => store.load_positions().await,
        }
    }

    async fn store_position(
        &self,
        origin: Option<NodeId>,
        position: SourcePosition,
    ) -> RelayResult<()> {
        match self {
            AnyCheckpointStore::Memory(store) => store.store_position(origin, position).await,
            AnyCheckpointStore::File(store) => store.store_position(origin, position).await,
        }
    }
}
