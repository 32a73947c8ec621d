use std::future::Future;

use crate::error::RelayResult;
use crate::types::OutputRecord;

/// Durable log that reconciled records are appended to, such as a data topic.
///
/// The reconciliation loop treats a successful [`EventLog::emit`] as the record being
/// durably written; only then is the notice checkpointed.
pub trait EventLog {
    /// Returns the name of the event log.
    fn name() -> &'static str;

    /// Appends one record.
    fn emit(&self, record: OutputRecord) -> impl Future<Output = RelayResult<()>> + Send;

    /// Flushes and releases the event log when the relay stops. Defaults to a no-op.
    fn shutdown(&self) -> impl Future<Output = RelayResult<()>> + Send {
        async { Ok(()) }
    }
}
