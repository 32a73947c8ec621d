use std::collections::BTreeMap;
use std::future::Future;

use crate::error::RelayResult;
use crate::types::{NodeId, SourcePosition};

/// Checkpointed position per origin node. The [`None`] origin holds the position of
/// notices that carry no node.
pub type Positions = BTreeMap<Option<NodeId>, SourcePosition>;

/// Durable storage of checkpointed positions.
pub trait CheckpointStore {
    /// Reads every stored position. An empty store yields an empty map.
    fn load_positions(&self) -> impl Future<Output = RelayResult<Positions>> + Send;

    /// Durably stores `position` as the checkpoint of `origin`.
    fn store_position(
        &self,
        origin: Option<NodeId>,
        position: SourcePosition,
    ) -> impl Future<Output = RelayResult<()>> + Send;
}
