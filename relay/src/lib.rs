//! Reconciles a change feed of row mutations with the current state of a source table.
//!
//! Change notices name a row, a mutation digest and the node that saw the mutation. Each
//! replica of a write produces its own notice. The relay reads every mutated row back from
//! the source, stepping down a ladder of consistency levels, and emits the row's current
//! content to an event log once per distinct mutation. Positions are checkpointed per node
//! after emission, so a restart resumes without losing notices.
//!
//! The [`pipeline::Pipeline`] wires the collaborators together; [`schema::SchemaBindingManager`]
//! follows schema changes of the watched table while the relay runs.

pub mod cache;
pub mod checkpoint;
pub mod concurrency;
pub mod conversions;
pub mod destination;
pub mod error;
pub mod failpoints;
mod macros;
pub mod metrics;
pub mod notices;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
