//! MQTT client wrapper around rumqttc.

use crate::config::MqttConfig;
use crate::error::{BridgeError, Result};
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Message received from MQTT broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// MQTT client owning the rumqttc event loop.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self { client, event_loop }
    }

    /// Connect to the broker and start the event loop.
    ///
    /// Waits for the broker to acknowledge the connection. Inbound publishes
    /// are forwarded to `tx` for as long as the returned task runs.
    pub async fn connect(
        config: &MqttConfig,
        tx: mpsc::Sender<MqttMessage>,
    ) -> Result<(AsyncClient, JoinHandle<()>)> {
        info!("[MQTT] Creating MQTT client for {}", config.broker_url());

        let mqtt_client = Self::new(config);
        let client = mqtt_client.client();
        let (connected_tx, connected_rx) = oneshot::channel();
        let event_loop = tokio::spawn(mqtt_client.run(tx, Some(connected_tx)));

        let failure = match tokio::time::timeout(CONNECT_TIMEOUT, connected_rx).await {
            Ok(Ok(())) => {
                info!("[MQTT] Connected to MQTT broker {}", config.broker_url());
                return Ok((client, event_loop));
            }
            Ok(Err(_)) => "event loop stopped before connecting".to_string(),
            Err(_) => format!("no CONNACK within {} seconds", CONNECT_TIMEOUT.as_secs()),
        };

        event_loop.abort();
        Err(BridgeError::MqttConnectFailed {
            broker: config.broker_url(),
            reason: failure,
        })
    }

    /// Run the MQTT event loop and forward messages to the provided channel.
    ///
    /// `connected` fires on the first CONNACK. Connection errors are retried
    /// after a delay, so this only returns once `tx` is closed.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<MqttMessage>,
        mut connected: Option<oneshot::Sender<()>>,
    ) {
        info!("[MQTT] Starting MQTT event loop");

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    debug!("[MQTT] Connection acknowledged");
                    if let Some(connected) = connected.take() {
                        let _ = connected.send(());
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic = publish.topic.clone();
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("[MQTT] Invalid UTF-8 in payload on {}: {}", topic, e);
                            continue;
                        }
                    };

                    debug!("[MQTT] Received message on {}: {}", topic, payload);

                    let msg = MqttMessage { topic, payload };
                    if tx.send(msg).await.is_err() {
                        error!("[MQTT] Message channel closed");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[MQTT] Connection error: {:?}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}
