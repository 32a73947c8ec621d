use uuid::Uuid;

use crate::types::{Cell, ChangeNotice, MutationDigest, NodeId, NoticeKey, SourcePosition};

/// Node id built from a small number, for readable tests.
pub fn node(id: u128) -> NodeId {
    NodeId::new(Uuid::from_u128(id))
}

/// Notice for a row of a table keyed by a single text column.
pub fn notice(key: &str, digest: &str, origin: NodeId, position: u64) -> ChangeNotice {
    ChangeNotice {
        key: NoticeKey::Scalar(Cell::from(key)),
        digest: MutationDigest::new(digest),
        origin,
        position: SourcePosition::new(position),
        partition: Some(0),
    }
}
