use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::destination::EventLog;
use crate::error::RelayResult;
use crate::types::OutputRecord;

#[derive(Debug)]
struct Inner {
    records: Vec<OutputRecord>,
    /// Notified once the record count reaches the given value.
    waiters: Vec<(usize, Arc<Notify>)>,
    shut_down: bool,
}

/// In-memory event log keeping every emitted record, for development and tests.
#[derive(Debug, Clone)]
pub struct MemoryEventLog {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                records: Vec::new(),
                waiters: Vec::new(),
                shut_down: false,
            })),
        }
    }

    pub async fn records(&self) -> Vec<OutputRecord> {
        self.inner.lock().await.records.clone()
    }

    pub async fn is_shut_down(&self) -> bool {
        self.inner.lock().await.shut_down
    }

    /// Returns a [`Notify`] that fires once at least `count` records were emitted.
    pub async fn notify_on_record_count(&self, count: usize) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.lock().await;
        if inner.records.len() >= count {
            notify.notify_one();
        } else {
            inner.waiters.push((count, notify.clone()));
        }

        notify
    }
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog for MemoryEventLog {
    fn name() -> &'static str {
        "memory"
    }

    async fn emit(&self, record: OutputRecord) -> RelayResult<()> {
        debug!(topic = %record.topic, delete = record.is_delete(), "emitting record");

        let mut inner = self.inner.lock().await;
        inner.records.push(record);

        let count = inner.records.len();
        inner.waiters.retain(|(target, notify)| {
            if count >= *target {
                notify.notify_one();
                false
            } else {
                true
            }
        });

        Ok(())
    }

    async fn shutdown(&self) -> RelayResult<()> {
        self.inner.lock().await.shut_down = true;
        Ok(())
    }
}
