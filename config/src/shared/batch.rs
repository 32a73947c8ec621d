use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Controls how change notices are pulled from the notice source.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Maximum number of notices reconciled in one batch.
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,
    /// Maximum time, in milliseconds, a fetch waits for notices before returning an empty batch.
    #[serde(default = "default_batch_max_fill_ms")]
    pub max_fill_ms: u64,
}

impl BatchConfig {
    pub const DEFAULT_MAX_SIZE: usize = 1000;

    pub const DEFAULT_MAX_FILL_MS: u64 = 1000;

    pub fn max_fill(&self) -> Duration {
        Duration::from_millis(self.max_fill_ms)
    }

    /// Ensures the batch size and the fill wait are non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.max_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.max_fill_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.max_fill_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_batch_max_size(),
            max_fill_ms: default_batch_max_fill_ms(),
        }
    }
}

fn default_batch_max_size() -> usize {
    BatchConfig::DEFAULT_MAX_SIZE
}

fn default_batch_max_fill_ms() -> u64 {
    BatchConfig::DEFAULT_MAX_FILL_MS
}
