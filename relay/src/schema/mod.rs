//! Schema tracking of the watched table.

mod binding;
mod event;
mod manager;
mod query;

pub use binding::SchemaBinding;
pub use event::{SchemaChange, SchemaChangeEvent, SchemaElement};
pub use manager::{SchemaBindingManager, SchemaEventOutcome, SchemaHealth};
pub use query::{QueryFingerprint, ReadQuery, quote_identifier};
