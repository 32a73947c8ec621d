use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Where per-node checkpoint positions are persisted.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum CheckpointStoreConfig {
    /// Positions live in memory only and are lost on restart.
    #[default]
    Memory,
    /// Positions are written as JSON to `path`.
    File { path: PathBuf },
}

impl CheckpointStoreConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let CheckpointStoreConfig::File { path } = self
            && path.as_os_str().is_empty()
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "checkpoint.path".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
