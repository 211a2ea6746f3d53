mod serial;
mod simulated;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use weatherstation_api::RawSnapshot;

pub use serial::SerialSource;
pub use simulated::{ChannelProfile, SimulatedSource};

use crate::errors::SourceError;
use crate::services::queue::SnapshotSender;

#[async_trait]
pub trait Source: Send {
    /// Take one snapshot from the station.
    async fn produce_snapshot(&mut self) -> Result<RawSnapshot, SourceError>;

    /// Pause between two acquisition attempts.
    fn cadence(&self) -> Duration;
}

/// Acquisition loop feeding the queue until shutdown.
pub async fn run_source<S>(mut source: S, queue: SnapshotSender, mut shutdown: watch::Receiver<bool>)
where
    S: Source,
{
    loop {
        if *shutdown.borrow() {
            break;
        }

        if queue.is_closed() {
            tracing::info!("snapshot queue closed, stopping source");
            break;
        }

        let produced = tokio::select! {
            _ = shutdown.changed() => break,
            produced = source.produce_snapshot() => produced,
        };

        match produced {
            Ok(snapshot) => {
                let missing = snapshot.missing();
                if !missing.is_empty() {
                    tracing::debug!(?missing, "snapshot has unavailable channels");
                }

                if queue.push(snapshot).await.is_err() {
                    tracing::info!("snapshot queue closed, stopping source");
                    break;
                }
            }
            Err(SourceError::Idle) => tracing::debug!("no data from transport"),
            Err(e @ SourceError::MalformedRecord { .. }) => tracing::warn!(error = %e, "dropped record"),
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "source stopped");
                break;
            }
            Err(e) => tracing::error!(error = %e, "source read failed"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(source.cadence()) => {}
        }
    }

    tracing::info!("source stopped");
}
