use std::time::Duration;

use rumqttc::{AsyncClient, ConnAck, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::watch;
use weatherstation_api::CalibratedReading;

use crate::configs::Gateway;
use crate::errors::TelemetryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Liveness message sent next to every reading.
#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    /// Wall clock in epoch seconds
    pub ts: f64,
    pub status: &'static str,
}

impl Heartbeat {
    pub fn now() -> Self {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();

        Self { ts: nanos as f64 / 1e9, status: "ok" }
    }
}

/// Best-effort telemetry output.
///
/// Returns `Ok(false)` when the message was skipped because the transport
/// is down. Nothing is queued for later delivery.
pub trait Telemetry: Send + Sync {
    fn publish_reading(&self, reading: &CalibratedReading) -> Result<bool, TelemetryError>;

    fn publish_heartbeat(&self) -> Result<bool, TelemetryError>;
}

pub struct TelemetryService {
    client: AsyncClient,
    state: watch::Receiver<ConnectionState>,
    topic: String,
    heartbeat_topic: String,
}

impl TelemetryService {
    /// Build the publisher and the driver that owns its network loop.
    ///
    /// Nothing touches the network until [`ConnectionDriver::run`] is polled.
    pub fn new(gateway: &Gateway) -> (Self, ConnectionDriver) {
        let mut options = MqttOptions::new(&gateway.client_id, &gateway.host, gateway.port);
        options.set_keep_alive(gateway.keep_alive());

        let (client, event_loop) = AsyncClient::new(options, 10);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let service = Self {
            client: client.clone(),
            state: state_rx,
            topic: gateway.topic.clone(),
            heartbeat_topic: gateway.heartbeat_topic(),
        };

        let driver = ConnectionDriver {
            client,
            event_loop,
            tracker: ConnectionTracker { state: state_tx },
            reconnect_delay: gateway.reconnect_delay(),
        };

        (service, driver)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn heartbeat_topic(&self) -> &str {
        &self.heartbeat_topic
    }

    /// Fire-and-forget publish, skipped while disconnected.
    pub fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<bool, TelemetryError> {
        let state = self.state();
        if state != ConnectionState::Connected {
            tracing::warn!(topic, ?state, "MQTT not connected, skipping publish");
            return Ok(false);
        }

        self.client.try_publish(topic, QoS::AtMostOnce, false, payload)?;

        Ok(true)
    }
}

impl Telemetry for TelemetryService {
    fn publish_reading(&self, reading: &CalibratedReading) -> Result<bool, TelemetryError> {
        self.publish(&self.topic, serde_json::to_vec(reading)?)
    }

    fn publish_heartbeat(&self) -> Result<bool, TelemetryError> {
        self.publish(&self.heartbeat_topic, serde_json::to_vec(&Heartbeat::now())?)
    }
}

/// Sole writer of the publisher's [`ConnectionState`].
#[derive(Debug)]
pub struct ConnectionTracker {
    state: watch::Sender<ConnectionState>,
}

impl ConnectionTracker {
    pub fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn handle_event(&self, event: &Event) {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => self.on_connect(ack),
            Event::Incoming(Packet::Disconnect) | Event::Outgoing(Outgoing::Disconnect) => self.on_disconnect(),
            _ => {}
        }
    }

    pub fn on_connecting(&self) {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
    }

    pub fn on_connect(&self, ack: &ConnAck) {
        if ack.code == ConnectReturnCode::Success {
            self.state.send_replace(ConnectionState::Connected);
            tracing::info!("MQTT connected");
        } else {
            self.state.send_replace(ConnectionState::Disconnected);
            tracing::warn!(code = ?ack.code, "MQTT connection refused");
        }
    }

    pub fn on_disconnect(&self) {
        let previous = self.state.send_replace(ConnectionState::Disconnected);
        if previous == ConnectionState::Connected {
            tracing::warn!("MQTT disconnected");
        }
    }
}

const DISCONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Background network loop for [`TelemetryService`].
pub struct ConnectionDriver {
    client: AsyncClient,
    event_loop: EventLoop,
    tracker: ConnectionTracker,
    reconnect_delay: Duration,
}

impl ConnectionDriver {
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Queue a DISCONNECT and keep polling until it has been written.
    async fn disconnect(&mut self) {
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!(error = %e, "MQTT disconnect request not sent");
            return;
        }

        let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match self.event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "MQTT connection closed while disconnecting");
                        break;
                    }
                }
            }
        })
        .await;

        if flushed.is_err() {
            tracing::warn!("MQTT disconnect not flushed in time");
        }
    }

    /// Poll the connection until shutdown, reconnecting after failures.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.tracker.on_connecting();

            tokio::select! {
                _ = shutdown.changed() => break,
                polled = self.event_loop.poll() => match polled {
                    Ok(event) => self.tracker.handle_event(&event),
                    Err(e) => {
                        self.tracker.on_disconnect();
                        tracing::warn!(error = %e, retry_in_ms = self.reconnect_delay.as_millis() as u64, "MQTT connection error");

                        tokio::select! {
                            _ = shutdown.changed() => break,
                            _ = tokio::time::sleep(self.reconnect_delay) => {}
                        }
                    }
                },
            }
        }

        if self.tracker.current() == ConnectionState::Connected {
            self.disconnect().await;
        }
        self.tracker.on_disconnect();

        tracing::info!("telemetry connection stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use weatherstation_api::Quantity;

    use super::*;

    fn gateway() -> Gateway {
        Gateway {
            host: "127.0.0.1".to_string(),
            port: 1,
            client_id: "station-test".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_ms: 50,
            topic: "weather/workstation".to_string(),
            status_topic: Some("weather/status/test".to_string()),
        }
    }

    async fn wait_connected(service: &TelemetryService) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !service.is_connected() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    fn success() -> Event {
        Event::Incoming(Packet::ConnAck(ConnAck { session_present: false, code: ConnectReturnCode::Success }))
    }

    #[tokio::test]
    async fn test_publish_while_disconnected_is_skipped() {
        let (service, _driver) = TelemetryService::new(&gateway());
        let reading = CalibratedReading::new(OffsetDateTime::now_utc(), [(Quantity::Oxygen, Some(20.9))]);

        let started = Instant::now();
        assert_eq!(service.state(), ConnectionState::Disconnected);
        assert!(!service.publish_reading(&reading).unwrap());
        assert!(!service.publish_heartbeat().unwrap());
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_connection_transitions() {
        let (service, driver) = TelemetryService::new(&gateway());
        let tracker = driver.tracker();

        tracker.on_connecting();
        assert_eq!(service.state(), ConnectionState::Connecting);
        assert!(!service.is_connected());

        tracker.handle_event(&success());
        assert!(service.is_connected());
        assert!(service.publish("weather/workstation", b"{}".to_vec()).unwrap());

        tracker.handle_event(&Event::Incoming(Packet::Disconnect));
        assert_eq!(service.state(), ConnectionState::Disconnected);
        assert!(!service.publish("weather/workstation", b"{}".to_vec()).unwrap());
    }

    #[tokio::test]
    async fn test_refused_connection_stays_disconnected() {
        let (service, driver) = TelemetryService::new(&gateway());

        driver.tracker().handle_event(&Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::NotAuthorized,
        })));

        assert_eq!(service.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connecting_does_not_downgrade() {
        let (service, driver) = TelemetryService::new(&gateway());

        driver.tracker().handle_event(&success());
        driver.tracker().on_connecting();

        assert_eq!(service.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_heartbeat_payload() {
        let value = serde_json::to_value(Heartbeat::now()).unwrap();

        assert_eq!(value["status"], "ok");
        assert!(value["ts"].as_f64().unwrap() > 1_600_000_000.0);
    }

    #[tokio::test]
    async fn test_driver_stops_on_shutdown() {
        let (service, driver) = TelemetryService::new(&gateway());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(driver.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert_eq!(service.state(), ConnectionState::Disconnected);
        assert_eq!(service.heartbeat_topic(), "weather/status/test/hb");
    }

    #[tokio::test]
    async fn test_shutdown_sends_disconnect_to_broker() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let broker = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // CONNECT: fixed header, then the remaining length fits in one byte
            let mut header = [0u8; 2];
            socket.read_exact(&mut header).await.unwrap();
            assert_eq!(header[0], 0x10);
            let mut body = vec![0u8; header[1] as usize];
            socket.read_exact(&mut body).await.unwrap();

            socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();

            let mut rest = Vec::new();
            tokio::time::timeout(Duration::from_secs(2), socket.read_to_end(&mut rest))
                .await
                .unwrap()
                .unwrap();
            rest
        });

        let (service, driver) = TelemetryService::new(&Gateway { port, ..gateway() });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(driver.run(shutdown_rx));

        wait_connected(&service).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();

        let received = broker.await.unwrap();
        assert!(received.windows(2).any(|w| w == [0xE0, 0x00]), "broker saw {received:?}");
        assert_eq!(service.state(), ConnectionState::Disconnected);
    }
}
