use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::checkpoint::{CheckpointStore, Positions};
use crate::error::{ErrorKind, RelayResult};
use crate::relay_error;
use crate::types::{NodeId, SourcePosition};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    positions: Vec<StoredPosition>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredPosition {
    origin: Option<NodeId>,
    position: SourcePosition,
}

/// Checkpoint store persisting every position to a JSON file.
///
/// Each update rewrites a temporary sibling file and renames it over the checkpoint file,
/// so a crash leaves either the old or the new content.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: Arc<PathBuf>,
    positions: Arc<Mutex<Option<Positions>>>,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            positions: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> RelayResult<Positions> {
        let bytes = match tokio::fs::read(self.path.as_ref()).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Positions::new()),
            Err(err) => {
                return Err(relay_error!(
                    ErrorKind::CheckpointIoError,
                    "Failed to read the checkpoint file",
                    self.path.display(),
                    source: err
                ));
            }
        };

        let file: CheckpointFile = serde_json::from_slice(&bytes).map_err(|err| {
            relay_error!(
                ErrorKind::CheckpointIoError,
                "Checkpoint file is corrupted",
                self.path.display(),
                source: err
            )
        })?;

        Ok(file
            .positions
            .into_iter()
            .map(|stored| (stored.origin, stored.position))
            .collect())
    }

    async fn write_file(&self, positions: &Positions) -> RelayResult<()> {
        let file = CheckpointFile {
            positions: positions
                .iter()
                .map(|(origin, position)| StoredPosition {
                    origin: *origin,
                    position: *position,
                })
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|err| {
            relay_error!(
                ErrorKind::SerializationError,
                "Failed to serialize checkpoints",
                source: err
            )
        })?;

        let mut temporary = OsString::from(self.path.as_os_str());
        temporary.push(".tmp");
        let temporary = PathBuf::from(temporary);

        tokio::fs::write(&temporary, bytes).await.map_err(|err| {
            relay_error!(
                ErrorKind::CheckpointIoError,
                "Failed to write the checkpoint file",
                temporary.display(),
                source: err
            )
        })?;
        tokio::fs::rename(&temporary, self.path.as_ref())
            .await
            .map_err(|err| {
                relay_error!(
                    ErrorKind::CheckpointIoError,
                    "Failed to replace the checkpoint file",
                    self.path.display(),
                    source: err
                )
            })?;

        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    async fn load_positions(&self) -> RelayResult<Positions> {
        let mut cached = self.positions.lock().await;
        let positions = self.read_file().await?;
        *cached = Some(positions.clone());

        Ok(positions)
    }

    async fn store_position(
        &self,
        origin: Option<NodeId>,
        position: SourcePosition,
    ) -> RelayResult<()> {
        let mut cached = self.positions.lock().await;
        let mut positions = match cached.as_ref() {
            Some(positions) => positions.clone(),
            None => self.read_file().await?,
        };
        positions.insert(origin, position);

        self.write_file(&positions).await?;
        *cached = Some(positions);

        Ok(())
    }
}
