//! Per-node checkpoints of reconciled change notice positions.

mod any;
mod base;
mod file;
mod memory;
mod offset;

pub use any::AnyCheckpointStore;
pub use base::{CheckpointStore, Positions};
pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;
pub use offset::OffsetCheckpoint;
