use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Sizing of the digest deduplication cache.
///
/// The cache keeps, per row key, the last `max_digests` mutation digests that were reconciled.
/// At most `max_capacity` keys are retained and every key expires `expire_after_ms`
/// milliseconds after its last recorded digest.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DedupCacheConfig {
    #[serde(default = "default_max_digests")]
    pub max_digests: usize,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: usize,
    #[serde(default = "default_expire_after_ms")]
    pub expire_after_ms: u64,
}

impl DedupCacheConfig {
    pub const DEFAULT_MAX_DIGESTS: usize = 3;

    pub const DEFAULT_MAX_CAPACITY: usize = 32767;

    pub const DEFAULT_EXPIRE_AFTER_MS: u64 = 60_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("cache.max_digests", self.max_digests as u64),
            ("cache.max_capacity", self.max_capacity as u64),
            ("cache.expire_after_ms", self.expire_after_ms),
        ] {
            if value == 0 {
                return Err(ValidationError::InvalidFieldValue {
                    field: field.to_string(),
                    constraint: "must be greater than 0".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl Default for DedupCacheConfig {
    fn default() -> Self {
        Self {
            max_digests: default_max_digests(),
            max_capacity: default_max_capacity(),
            expire_after_ms: default_expire_after_ms(),
        }
    }
}

fn default_max_digests() -> usize {
    DedupCacheConfig::DEFAULT_MAX_DIGESTS
}

fn default_max_capacity() -> usize {
    DedupCacheConfig::DEFAULT_MAX_CAPACITY
}

fn default_expire_after_ms() -> u64 {
    DedupCacheConfig::DEFAULT_EXPIRE_AFTER_MS
}
