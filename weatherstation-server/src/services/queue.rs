use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use weatherstation_api::RawSnapshot;

use crate::errors::QueueError;

/// Create the hand-off between the source and the processor.
pub fn channel(capacity: usize, stall_warning: Duration) -> (SnapshotSender, SnapshotReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    (SnapshotSender { tx, stall_warning }, SnapshotReceiver { rx })
}

#[derive(Debug)]
pub struct SnapshotSender {
    tx: mpsc::Sender<RawSnapshot>,
    stall_warning: Duration,
}

impl SnapshotSender {
    /// Enqueue a snapshot, waiting for room instead of dropping it.
    pub async fn push(&self, snapshot: RawSnapshot) -> Result<(), QueueError> {
        let snapshot = match self.tx.try_send(snapshot) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(_)) => return Err(QueueError::Closed),
            Err(TrySendError::Full(snapshot)) => snapshot,
        };

        tracing::warn!(capacity = self.tx.max_capacity(), "snapshot queue full, waiting for processor");

        let started = Instant::now();
        self.tx.send(snapshot).await.map_err(|_| QueueError::Closed)?;

        let waited = started.elapsed();
        if waited >= self.stall_warning {
            tracing::warn!(waited_ms = waited.as_millis() as u64, "snapshot queue stalled");
        }

        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct SnapshotReceiver {
    rx: mpsc::Receiver<RawSnapshot>,
}

impl SnapshotReceiver {
    /// Wait for at least one snapshot, then take everything queued.
    ///
    /// Returns `None` once the sender is gone and nothing is left.
    pub async fn drain(&mut self) -> Option<Vec<RawSnapshot>> {
        let first = self.rx.recv().await?;

        let mut batch = vec![first];
        while let Ok(snapshot) = self.rx.try_recv() {
            batch.push(snapshot);
        }

        Some(batch)
    }
}
