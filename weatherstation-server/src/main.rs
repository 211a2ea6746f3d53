use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};
use weatherstation_server::configs::{Settings, open_log_file};
use weatherstation_server::run;

#[tokio::main]
async fn main() {
    let settings = Arc::new(Settings::new().expect("Failed to load settings."));

    let file_layer = settings.logger.file.as_deref().and_then(|path| {
        let path = Path::new(path);

        match open_log_file(path) {
            Ok(file) => {
                let level = settings.logger.file_level.as_deref().unwrap_or("warn");

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file))
                        .with_filter(LevelFilter::from_str(level).unwrap_or(LevelFilter::WARN)),
                )
            }
            Err(e) => {
                eprintln!("Failed to open log file {}: {e}", path.display());
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
            let level = settings.logger.level.as_str();

            format!("{app_name}={level},weatherstation_api={level}").into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    run(&settings).await;
}
