use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, RelayResult};
use crate::relay_error;
use crate::types::Cell;

/// Identifier of a source database node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for NodeId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(NodeId)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hash of a mutation as reported by the change feed.
///
/// Replicas of the same write report the same digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationDigest(String);

impl MutationDigest {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MutationDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a change notice in the change feed of its origin node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SourcePosition(u64);

impl SourcePosition {
    pub const fn new(position: u64) -> Self {
        Self(position)
    }

    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl From<u64> for SourcePosition {
    fn from(position: u64) -> Self {
        Self(position)
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary key of the row a change notice refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NoticeKey {
    /// Key of a table with a single primary key column.
    Scalar(Cell),
    /// Key of a table with a composite primary key, as column name and value pairs.
    Composite(Vec<(String, Cell)>),
}

impl NoticeKey {
    /// Returns the value of the key column `name` at position `index` of a key with `total`
    /// columns.
    pub fn value_of(&self, index: usize, name: &str, total: usize) -> Option<&Cell> {
        match self {
            NoticeKey::Scalar(cell) if total == 1 && index == 0 => Some(cell),
            NoticeKey::Scalar(_) => None,
            NoticeKey::Composite(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, cell)| cell),
        }
    }

    /// Returns the deduplication cache key of this row key.
    ///
    /// Composite key columns are ordered by name, so the same row yields the same key whatever
    /// order the notice lists its columns in.
    pub fn cache_key(&self) -> RelayResult<CacheKey> {
        let fields: Vec<(&str, &Cell)> = match self {
            NoticeKey::Scalar(cell) => vec![("", cell)],
            NoticeKey::Composite(fields) => {
                let mut fields: Vec<(&str, &Cell)> = fields
                    .iter()
                    .map(|(name, cell)| (name.as_str(), cell))
                    .collect();
                fields.sort_by(|a, b| a.0.cmp(b.0));
                fields
            }
        };

        serde_json::to_string(&fields).map(CacheKey).map_err(|err| {
            relay_error!(
                ErrorKind::SerializationError,
                "Failed to build the deduplication key of a row",
                source: err
            )
        })
    }
}

/// Canonical, hashable rendering of a [`NoticeKey`] as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

/// Notification that a row was mutated on one node.
///
/// Each replica of a write produces its own notice, so the same write is typically announced
/// once per replica with the same digest.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotice {
    pub key: NoticeKey,
    pub digest: MutationDigest,
    pub origin: NodeId,
    pub position: SourcePosition,
    /// Partition of the notice topic the notice was read from, copied onto the emitted record.
    pub partition: Option<i32>,
}
