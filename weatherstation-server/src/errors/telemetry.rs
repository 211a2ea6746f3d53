#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
