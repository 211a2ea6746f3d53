use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use weatherstation_api::ThresholdTable;

use crate::configs::Settings;
use crate::configs::Source as SourceSettings;
use crate::services::queue::{self, SnapshotSender};
use crate::services::{CsvRecordStore, Processor, RecordSink, TelemetryService};
use crate::sources::{SerialSource, SimulatedSource, run_source};

pub mod configs;
pub mod errors;
pub mod services;
pub mod sources;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Running acquisition pipeline and the handles needed to stop it.
pub struct Station {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    // keeps the queue open when no source could be started
    parked_sender: Option<SnapshotSender>,
}

impl Station {
    /// Spawn every unit of the pipeline. Failures of the record file or the
    /// serial port are logged and leave the remaining units running.
    pub fn start(settings: &Settings) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        let records = CsvRecordStore::new(&settings.record.path);
        if let Err(e) = records.ensure_initialized() {
            tracing::error!(error = %e, path = %records.path().display(), "failed to initialize record file");
        }

        let (telemetry, driver) = TelemetryService::new(&settings.gateway);
        tracing::info!(
            host = %settings.gateway.host,
            port = settings.gateway.port,
            topic = telemetry.topic(),
            heartbeat = telemetry.heartbeat_topic(),
            "starting telemetry"
        );
        tasks.push(("telemetry", tokio::spawn(driver.run(shutdown_rx.clone()))));

        let (sender, receiver) = queue::channel(settings.pipeline.queue_capacity, settings.pipeline.stall_warning());

        let parked_sender = match Self::spawn_source(settings, sender, shutdown_rx.clone()) {
            Ok(handle) => {
                tasks.push(("source", handle));
                None
            }
            Err(sender) => Some(sender),
        };

        let processor = Processor::new(
            records,
            telemetry,
            ThresholdTable::default(),
            settings.pipeline.process_interval(),
        );
        tasks.push(("processor", tokio::spawn(processor.run(receiver, shutdown_rx))));

        Self { shutdown, tasks, parked_sender }
    }

    fn spawn_source(
        settings: &Settings,
        sender: SnapshotSender,
        shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, SnapshotSender> {
        match &settings.source {
            SourceSettings::Serial { port_path, baud_rate, timeout_ms, idle_pause_ms } => {
                match SerialSource::open(
                    port_path.as_deref(),
                    *baud_rate,
                    Duration::from_millis(*timeout_ms),
                    Duration::from_millis(*idle_pause_ms),
                ) {
                    Ok(source) => {
                        tracing::info!(port = ?port_path, baud_rate, "reading from serial source");
                        Ok(tokio::spawn(run_source(source, sender, shutdown)))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "serial source unavailable, continuing without input");
                        Err(sender)
                    }
                }
            }
            SourceSettings::Simulated { read_interval_ms, max_retries, retry_pause_ms, failure_rate } => {
                match SimulatedSource::from_entropy(
                    Duration::from_millis(*read_interval_ms),
                    *max_retries,
                    Duration::from_millis(*retry_pause_ms),
                    *failure_rate,
                ) {
                    Ok(source) => {
                        tracing::info!(failure_rate, "reading from simulated source");
                        Ok(tokio::spawn(run_source(source, sender, shutdown)))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "simulated source unavailable, continuing without input");
                        Err(sender)
                    }
                }
            }
        }
    }

    pub fn has_source(&self) -> bool {
        self.parked_sender.is_none()
    }

    /// Signal every unit to stop and wait out the grace period.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        drop(self.parked_sender);

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;

        for (name, mut handle) in self.tasks {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => tracing::debug!(task = name, "task finished"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "task failed"),
                Err(_) => {
                    tracing::warn!(task = name, "task did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}

pub async fn run(settings: &Arc<Settings>) {
    let station = Station::start(settings);

    shutdown_signal().await;
    tracing::info!("shutdown requested");

    station.stop().await;

    tracing::info!("weather station stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
