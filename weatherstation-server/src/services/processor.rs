use std::fmt::Write;
use std::time::Duration;

use tokio::sync::watch;
use weatherstation_api::{CalibratedReading, RawSnapshot, ThresholdTable, Verdicts, convert};

use crate::services::queue::SnapshotReceiver;
use crate::services::record_service::{RecordSink, format_value};
use crate::services::telemetry_service::Telemetry;

pub struct Processor<R, T> {
    records: R,
    telemetry: T,
    thresholds: ThresholdTable,
    interval: Duration,
}

impl<R, T> Processor<R, T>
where
    R: RecordSink,
    T: Telemetry,
{
    pub fn new(records: R, telemetry: T, thresholds: ThresholdTable, interval: Duration) -> Self {
        Self { records, telemetry, thresholds, interval }
    }

    /// Drain and dispatch until the queue closes or shutdown is signalled.
    pub async fn run(self, mut receiver: SnapshotReceiver, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                _ = shutdown.changed() => break,
                batch = receiver.drain() => match batch {
                    Some(batch) => batch,
                    None => {
                        tracing::info!("snapshot queue closed");
                        break;
                    }
                },
            };

            self.process_batch(batch);

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("processor stopped");
    }

    /// Handle one drained burst. Only the newest snapshot is calibrated;
    /// older ones in the same burst are discarded.
    pub fn process_batch(&self, batch: Vec<RawSnapshot>) -> Option<CalibratedReading> {
        let coalesced = batch.len().saturating_sub(1);
        let snapshot = batch.into_iter().last()?;

        if coalesced > 0 {
            tracing::debug!(coalesced, "discarded older snapshots in burst");
        }

        let reading = convert(&snapshot);
        let verdicts = self.thresholds.evaluate(&reading);

        self.report(&reading, &verdicts);

        if let Err(e) = self.records.append(&reading) {
            tracing::error!(error = %e, timestamp = %reading.timestamp, "failed to persist reading");
        }

        if let Err(e) = self.telemetry.publish_reading(&reading) {
            tracing::warn!(error = %e, timestamp = %reading.timestamp, "failed to publish reading");
        }

        if let Err(e) = self.telemetry.publish_heartbeat() {
            tracing::warn!(error = %e, "failed to publish heartbeat");
        }

        Some(reading)
    }

    fn report(&self, reading: &CalibratedReading, verdicts: &Verdicts) {
        let mut summary = String::new();

        for (quantity, value) in reading.iter() {
            let verdict = verdicts[&quantity];
            let value = value.map(format_value).unwrap_or_else(|| "n/a".to_string());
            let _ = write!(summary, "\n  {:<21} {:>8} {:<6} {}", quantity.name(), value, quantity.unit(), verdict);

            if verdict.is_alert() {
                tracing::warn!(
                    quantity = quantity.name(),
                    value = %value,
                    limit = self.thresholds.limit(quantity),
                    "threshold exceeded"
                );
            }
        }

        tracing::info!(timestamp = %reading.timestamp, "calibrated reading{summary}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use time::OffsetDateTime;
    use weatherstation_api::{Channel, Quantity};

    use super::*;
    use crate::errors::{RecordError, TelemetryError};

    #[derive(Default, Clone)]
    struct MemorySink {
        rows: Arc<Mutex<Vec<CalibratedReading>>>,
        fail: bool,
    }

    impl RecordSink for MemorySink {
        fn ensure_initialized(&self) -> Result<(), RecordError> {
            Ok(())
        }

        fn append(&self, reading: &CalibratedReading) -> Result<(), RecordError> {
            if self.fail {
                return Err(RecordError::Io(std::io::Error::other("disk full")));
            }
            self.rows.lock().unwrap().push(reading.clone());
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    struct MemoryTelemetry {
        readings: Arc<Mutex<Vec<CalibratedReading>>>,
        heartbeats: Arc<Mutex<usize>>,
    }

    impl Telemetry for MemoryTelemetry {
        fn publish_reading(&self, reading: &CalibratedReading) -> Result<bool, TelemetryError> {
            self.readings.lock().unwrap().push(reading.clone());
            Ok(true)
        }

        fn publish_heartbeat(&self) -> Result<bool, TelemetryError> {
            *self.heartbeats.lock().unwrap() += 1;
            Ok(true)
        }
    }

    fn snapshot(co2: u16) -> RawSnapshot {
        RawSnapshot::new(OffsetDateTime::now_utc(), [(Channel::Co2, Some(co2))])
    }

    fn processor(sink: MemorySink, telemetry: MemoryTelemetry) -> Processor<MemorySink, MemoryTelemetry> {
        Processor::new(sink, telemetry, ThresholdTable::default(), Duration::from_millis(10))
    }

    #[test]
    fn test_latest_snapshot_wins() {
        let sink = MemorySink::default();
        let telemetry = MemoryTelemetry::default();
        let processor = processor(sink.clone(), telemetry.clone());

        let batch = vec![snapshot(100), snapshot(200), snapshot(300)];
        let expected = convert(batch.last().unwrap());

        let reading = processor.process_batch(batch).unwrap();

        assert_eq!(reading, expected);
        assert_eq!(*sink.rows.lock().unwrap(), vec![expected.clone()]);
        assert_eq!(*telemetry.readings.lock().unwrap(), vec![expected]);
        assert_eq!(*telemetry.heartbeats.lock().unwrap(), 1);
    }

    #[test]
    fn test_empty_batch_does_nothing() {
        let sink = MemorySink::default();
        let telemetry = MemoryTelemetry::default();

        assert!(processor(sink.clone(), telemetry.clone()).process_batch(Vec::new()).is_none());
        assert!(sink.rows.lock().unwrap().is_empty());
        assert_eq!(*telemetry.heartbeats.lock().unwrap(), 0);
    }

    #[test]
    fn test_persistence_failure_still_publishes() {
        let sink = MemorySink { fail: true, ..Default::default() };
        let telemetry = MemoryTelemetry::default();

        let reading = processor(sink, telemetry.clone()).process_batch(vec![snapshot(1023)]).unwrap();

        assert_eq!(reading.get(Quantity::Co2), Some(2000.0));
        assert_eq!(telemetry.readings.lock().unwrap().len(), 1);
        assert_eq!(*telemetry.heartbeats.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let sink = MemorySink::default();
        let (queue_tx, queue_rx) = crate::services::queue::channel(4, Duration::from_secs(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(processor(sink.clone(), MemoryTelemetry::default()).run(queue_rx, shutdown_rx));

        queue_tx.push(snapshot(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(sink.rows.lock().unwrap().len(), 1);
    }
}
