//! Helpers for testing the relay without a source database.

#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod notice;
pub mod notify;
pub mod pipeline;
pub mod source;
pub mod table;
