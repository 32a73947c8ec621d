//! Shared configuration types for the mutation relay.

mod base;
mod batch;
mod cache;
mod checkpoint;
mod consistency;
mod relay;

pub use base::ValidationError;
pub use batch::BatchConfig;
pub use cache::DedupCacheConfig;
pub use checkpoint::CheckpointStoreConfig;
pub use consistency::ConsistencyLevel;
pub use relay::RelayConfig;
