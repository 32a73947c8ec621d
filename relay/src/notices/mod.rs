mod base;
mod channel;

pub use base::NoticeSource;
pub use channel::{ChannelNoticeSource, NoticeSender};
