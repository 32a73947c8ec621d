use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{
    BatchConfig, CheckpointStoreConfig, ConsistencyLevel, DedupCacheConfig, ValidationError,
};

/// Configuration of one relay instance watching a single table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RelayConfig {
    /// Keyspace of the watched table.
    pub keyspace: String,
    /// Name of the watched table.
    pub table: String,
    /// Topic receiving reconciled records, defaults to `data-<keyspace>.<table>`.
    #[serde(default)]
    pub data_topic: Option<String>,
    #[serde(default)]
    pub cache: DedupCacheConfig,
    /// Consistency levels tried in order, strongest first, when reading rows back.
    #[serde(default = "default_consistency_ladder")]
    pub consistency_ladder: Vec<ConsistencyLevel>,
    /// Only non-key columns whose name fully matches this pattern are replicated.
    #[serde(default)]
    pub columns_regexp: Option<String>,
    /// Records a digest as processed only when the replica that answered the read-back is the
    /// node the mutation originated from.
    #[serde(default)]
    pub cache_only_if_coordinator_match: bool,
    #[serde(default)]
    pub batch: BatchConfig,
    /// Timeout, in milliseconds, of a single read-back attempt at one consistency level.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default)]
    pub checkpoint: CheckpointStoreConfig,
}

impl RelayConfig {
    pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

    /// Creates a configuration with default settings for `keyspace.table`.
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            data_topic: None,
            cache: DedupCacheConfig::default(),
            consistency_ladder: default_consistency_ladder(),
            columns_regexp: None,
            cache_only_if_coordinator_match: false,
            batch: BatchConfig::default(),
            read_timeout_ms: default_read_timeout_ms(),
            checkpoint: CheckpointStoreConfig::default(),
        }
    }

    /// Returns the topic reconciled records are emitted to.
    pub fn data_topic(&self) -> String {
        match &self.data_topic {
            Some(topic) => topic.clone(),
            None => format!("data-{}.{}", self.keyspace, self.table),
        }
    }

    /// Returns the column inclusion pattern, anchored to match whole column names.
    ///
    /// An absent, empty or `.*` pattern selects every column and yields [`None`].
    pub fn column_pattern(&self) -> Result<Option<Regex>, ValidationError> {
        match self.columns_regexp.as_deref() {
            None | Some("") | Some(".*") => Ok(None),
            Some(pattern) => Regex::new(&format!("^(?:{pattern})$"))
                .map(Some)
                .map_err(|err| ValidationError::InvalidColumnsRegexp(err.to_string())),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.keyspace.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "keyspace".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.table.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "table".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.consistency_ladder.is_empty() {
            return Err(ValidationError::EmptyConsistencyLadder);
        }

        if self.read_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "read_timeout_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        self.column_pattern()?;
        self.cache.validate()?;
        self.batch.validate()?;
        self.checkpoint.validate()?;

        Ok(())
    }
}

impl Config for RelayConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["consistency_ladder"];
}

fn default_consistency_ladder() -> Vec<ConsistencyLevel> {
    ConsistencyLevel::DEFAULT_LADDER.to_vec()
}

fn default_read_timeout_ms() -> u64 {
    RelayConfig::DEFAULT_READ_TIMEOUT_MS
}
