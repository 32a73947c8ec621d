use std::future::Future;

use crate::checkpoint::Positions;
use crate::error::RelayResult;
use crate::types::ChangeNotice;

/// Source of change notices, such as a consumer of the change feed topic.
pub trait NoticeSource {
    /// Tells the source where the relay resumes: notices at or before these positions were
    /// already reconciled.
    ///
    /// The default implementation does nothing; the reconciliation loop filters replayed
    /// notices itself.
    fn resume_after(
        &mut self,
        _positions: &Positions,
    ) -> impl Future<Output = RelayResult<()>> + Send {
        async { Ok(()) }
    }

    /// Waits for the next notices and returns at most `max_notices` of them.
    ///
    /// May wait indefinitely; the caller bounds the wait.
    fn fetch(
        &mut self,
        max_notices: usize,
    ) -> impl Future<Output = RelayResult<Vec<ChangeNotice>>> + Send;
}
