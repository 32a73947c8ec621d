use std::time::Duration;

use config::shared::ConsistencyLevel;
use metrics::counter;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::bail;
use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::metrics::{CONSISTENCY_LABEL, RELAY_READ_CONSISTENCY_DOWNGRADES_TOTAL};
use crate::relay_error;
use crate::schema::SchemaBinding;
use crate::source::SourceClient;
use crate::types::{Cell, MutationDigest, NodeId, Row};

/// Outcome of a successful read-back.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadBack {
    /// Current row, [`None`] when it no longer exists.
    pub row: Option<Row>,
    pub consistency: ConsistencyLevel,
    pub coordinator: Option<NodeId>,
}

/// Reads rows back from the source, stepping down a ladder of consistency levels until one
/// succeeds.
#[derive(Debug, Clone)]
pub struct ConsistencyEscalatingReader<C> {
    client: C,
    read_timeout: Duration,
}

impl<C> ConsistencyEscalatingReader<C>
where
    C: SourceClient + Sync,
{
    pub fn new(client: C, read_timeout: Duration) -> Self {
        Self {
            client,
            read_timeout,
        }
    }

    /// Reads the row identified by `key_values` with the statement of `binding`.
    ///
    /// Levels are tried in ladder order. A failed or timed out attempt moves on to the next
    /// level. When every level fails the error aggregates all attempts under
    /// [`ErrorKind::ReadBackFailed`].
    pub async fn read(
        &self,
        binding: &SchemaBinding,
        key_values: &[Cell],
        digest: &MutationDigest,
        ladder: &[ConsistencyLevel],
    ) -> RelayResult<ReadBack> {
        let Some(strongest) = ladder.first() else {
            bail!(ErrorKind::InvalidState, "Consistency ladder is empty");
        };

        let statement = binding.prepared_statement(&self.client).await?;
        let mut failures: Vec<RelayError> = Vec::with_capacity(ladder.len());

        for &consistency in ladder {
            let attempt = timeout(
                self.read_timeout,
                self.client.read(&statement, key_values, consistency),
            )
            .await;

            match attempt {
                Ok(Ok(response)) => {
                    if consistency != *strongest {
                        counter!(
                            RELAY_READ_CONSISTENCY_DOWNGRADES_TOTAL,
                            CONSISTENCY_LABEL => consistency.as_str()
                        )
                        .increment(1);
                    }

                    debug!(
                        %digest,
                        %consistency,
                        found = response.row.is_some(),
                        "read back row"
                    );

                    return Ok(ReadBack {
                        row: response.row,
                        consistency,
                        coordinator: response.coordinator,
                    });
                }
                Ok(Err(err)) => {
                    warn!(%digest, %consistency, error = %err, "read-back attempt failed");
                    failures.push(err);
                }
                Err(elapsed) => {
                    warn!(
                        %digest,
                        %consistency,
                        timeout_ms = self.read_timeout.as_millis() as u64,
                        "read-back attempt timed out"
                    );
                    failures.push(
                        relay_error!(
                            ErrorKind::SourceReadTimeout,
                            "Read-back attempt timed out",
                            format!("consistency {consistency}"),
                            source: elapsed
                        ),
                    );
                }
            }
        }

        Err(relay_error!(
            ErrorKind::ReadBackFailed,
            "Row could not be read back at any consistency level",
            format!("mutation {digest}, {} levels tried", ladder.len()),
            source: RelayError::from(failures)
        ))
    }
}
