//! Shutdown signalling between a relay and its workers.

use tokio::sync::watch;

/// Receiver side of the shutdown signal. A value change means "stop".
pub type ShutdownRx = watch::Receiver<()>;

/// Sender side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<()>);

impl ShutdownTx {
    /// Asks every subscribed worker to stop.
    ///
    /// Returns an error when no worker is listening anymore.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    /// Creates a new receiver that has not yet observed a shutdown.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_observe_shutdown() {
        let (tx, mut rx) = create_shutdown_channel();
        let mut late = tx.subscribe();

        assert!(!rx.has_changed().unwrap());
        tx.shutdown().unwrap();

        rx.changed().await.unwrap();
        late.changed().await.unwrap();
    }
}
