use tokio::sync::mpsc;

use crate::bail;
use crate::checkpoint::Positions;
use crate::error::{ErrorKind, RelayResult};
use crate::notices::NoticeSource;
use crate::types::ChangeNotice;

/// Sending half of a [`ChannelNoticeSource`].
pub type NoticeSender = mpsc::UnboundedSender<ChangeNotice>;

/// In-process notice source fed through a channel.
///
/// Used when notices are produced by the same process, and in tests.
#[derive(Debug)]
pub struct ChannelNoticeSource {
    rx: mpsc::UnboundedReceiver<ChangeNotice>,
    resumed_from: Option<Positions>,
}

impl ChannelNoticeSource {
    pub fn new() -> (NoticeSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx,
                resumed_from: None,
            },
        )
    }

    /// Positions passed to the last [`NoticeSource::resume_after`] call.
    pub fn resumed_from(&self) -> Option<&Positions> {
        self.resumed_from.as_ref()
    }
}

impl NoticeSource for ChannelNoticeSource {
    async fn resume_after(&mut self, positions: &Positions) -> RelayResult<()> {
        self.resumed_from = Some(positions.clone());
        Ok(())
    }

    async fn fetch(&mut self, max_notices: usize) -> RelayResult<Vec<ChangeNotice>> {
        let mut notices = Vec::with_capacity(max_notices);
        if self.rx.recv_many(&mut notices, max_notices).await == 0 {
            bail!(
                ErrorKind::NoticeSourceFailed,
                "Notice channel was closed by every sender"
            );
        }

        Ok(notices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::notice::{node, notice};

    #[tokio::test]
    async fn fetch_returns_at_most_the_requested_notices() {
        let (tx, mut source) = ChannelNoticeSource::new();
        for position in 1..=3 {
            tx.send(notice("k1", "d1", node(1), position)).unwrap();
        }

        assert_eq!(source.fetch(2).await.unwrap().len(), 2);
        assert_eq!(source.fetch(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closed_channel_fails_the_fetch() {
        let (tx, mut source) = ChannelNoticeSource::new();
        drop(tx);

        let err = source.fetch(10).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoticeSourceFailed);
    }
}
