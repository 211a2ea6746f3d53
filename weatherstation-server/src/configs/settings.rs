use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::configs::{hostname, normalize_path};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
    pub file: Option<String>,
    pub file_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
    pub topic: String,
    pub status_topic: Option<String>,
}

impl Gateway {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Heartbeat topic, `<status_topic>/hb`.
    pub fn heartbeat_topic(&self) -> String {
        let status = self
            .status_topic
            .clone()
            .unwrap_or_else(|| format!("weather/status/{}", hostname()));

        format!("{}/hb", status.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub process_interval_ms: u64,
    pub queue_capacity: usize,
    pub stall_warning_ms: u64,
}

impl Pipeline {
    pub fn process_interval(&self) -> Duration {
        Duration::from_millis(self.process_interval_ms)
    }

    pub fn stall_warning(&self) -> Duration {
        Duration::from_millis(self.stall_warning_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    Serial {
        port_path: Option<String>,
        baud_rate: u32,
        timeout_ms: u64,
        idle_pause_ms: u64,
    },
    Simulated {
        read_interval_ms: u64,
        max_retries: u32,
        retry_pause_ms: u64,
        failure_rate: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub gateway: Gateway,
    pub record: Record,
    pub pipeline: Pipeline,
    pub source: Source,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());

        let mut settings: Settings = Config::builder()
            .add_source(File::with_name("configs/default"))
            .add_source(File::with_name(&format!("configs/{run_mode}")).required(false))
            .add_source(Environment::default().separator("__"))
            .build()?
            .try_deserialize()?;

        settings.record.path = normalize_path(&settings.record.path)
            .map_err(|e| ConfigError::Message(e.to_string()))?
            .to_string_lossy()
            .to_string();

        if let Some(file) = &settings.logger.file {
            let file = normalize_path(file)
                .map_err(|e| ConfigError::Message(e.to_string()))?
                .to_string_lossy()
                .to_string();

            settings.logger.file = Some(file);
        }

        if let Source::Simulated { failure_rate, .. } = &settings.source {
            if !(0.0..=1.0).contains(failure_rate) {
                return Err(ConfigError::Message(format!(
                    "source.failure_rate must be within 0..=1, got {failure_rate}"
                )));
            }
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(status_topic: Option<&str>) -> Gateway {
        Gateway {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: "station".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_ms: 1000,
            topic: "weather/workstation".to_string(),
            status_topic: status_topic.map(str::to_string),
        }
    }

    #[test]
    fn test_heartbeat_topic() {
        assert_eq!(gateway(Some("weather/status/roof")).heartbeat_topic(), "weather/status/roof/hb");
        assert_eq!(gateway(Some("weather/status/roof/")).heartbeat_topic(), "weather/status/roof/hb");
        assert!(gateway(None).heartbeat_topic().starts_with("weather/status/"));
        assert!(gateway(None).heartbeat_topic().ends_with("/hb"));
    }

    #[test]
    fn test_source_is_tagged() {
        let source: Source = serde_json::from_value(serde_json::json!({
            "type": "simulated",
            "read_interval_ms": 1000,
            "max_retries": 3,
            "retry_pause_ms": 100,
            "failure_rate": 0.0,
        }))
        .unwrap();

        assert!(matches!(source, Source::Simulated { max_retries: 3, .. }));
    }
}
