use std::fmt;

use serde::{Deserialize, Serialize};

/// Read consistency level requested from the source database.
///
/// Variants follow the replica-count semantics of the source database; the relay only cares
/// about their order inside a consistency ladder.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    All,
    EachQuorum,
    Quorum,
    LocalQuorum,
    Three,
    Two,
    One,
    LocalOne,
    Serial,
    LocalSerial,
}

impl ConsistencyLevel {
    /// Ladder used when none is configured: local quorum first, then a single local replica.
    pub const DEFAULT_LADDER: [ConsistencyLevel; 2] =
        [ConsistencyLevel::LocalQuorum, ConsistencyLevel::LocalOne];

    /// Returns the wire name of the level, e.g. `LOCAL_QUORUM`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::All => "ALL",
            ConsistencyLevel::EachQuorum => "EACH_QUORUM",
            ConsistencyLevel::Quorum => "QUORUM",
            ConsistencyLevel::LocalQuorum => "LOCAL_QUORUM",
            ConsistencyLevel::Three => "THREE",
            ConsistencyLevel::Two => "TWO",
            ConsistencyLevel::One => "ONE",
            ConsistencyLevel::LocalOne => "LOCAL_ONE",
            ConsistencyLevel::Serial => "SERIAL",
            ConsistencyLevel::LocalSerial => "LOCAL_SERIAL",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
