//! Control requests arriving over MQTT and forwarded to the CEC bus.

use super::Bridge;
use crate::cec::CecConnection;
use crate::error::{BridgeError, Result};
use crate::mqtt::MqttTransport;
use crate::topic;
use log::{debug, error, warn};
use serde::Deserialize;

/// Payload of a `cec/key/send` request: `{"address": 4, "key": "0x41"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeySendRequest {
    pub address: f64,
    pub key: String,
}

impl KeySendRequest {
    /// Decode a request. Missing or mistyped fields are a malformed request.
    pub fn decode(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| BridgeError::MalformedRequest(e.to_string()))
    }

    /// The target logical address, with any fractional part truncated.
    pub fn logical_address(&self) -> Result<u8> {
        let address = self.address.trunc();
        if (0.0..=15.0).contains(&address) {
            Ok(address as u8)
        } else {
            Err(BridgeError::MalformedRequest(format!(
                "address {} is not a logical address",
                self.address
            )))
        }
    }
}

impl<C: CecConnection, M: MqttTransport> Bridge<C, M> {
    /// Route an inbound MQTT message to its control handler.
    pub async fn handle_message(&self, topic: &str, payload: &str) {
        if topic == self.topic(topic::KEY_SEND) {
            self.on_key_send(payload).await;
        } else if topic == self.topic(topic::COMMAND_TX) {
            self.on_command_send(payload).await;
        } else {
            debug!("[Bridge] Ignoring message on {}", topic);
        }
    }

    /// Transmit the payload as a raw CEC command. Blank payloads are ignored.
    pub async fn on_command_send(&self, payload: &str) {
        if payload.trim().is_empty() {
            return;
        }

        let _guard = self.send_lock.lock().await;
        self.publish_logged(topic::COMMAND_TX, "", false).await;
        debug!("[Bridge] Sending command {}", payload);
        if let Err(e) = self.cec.transmit(payload).await {
            error!("[Bridge] Could not transmit {:?}: {}", payload, e);
        }
    }

    /// Press a key on a device, as requested by a JSON payload.
    pub async fn on_key_send(&self, payload: &str) {
        if payload.trim().is_empty() {
            return;
        }

        let (address, key) = match KeySendRequest::decode(payload)
            .and_then(|request| Ok((request.logical_address()?, request.key)))
        {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("[Bridge] Could not parse key send payload {:?}: {}", payload, e);
                return;
            }
        };
        if key.trim().is_empty() {
            return;
        }

        let _guard = self.send_lock.lock().await;
        self.publish_logged(topic::KEY_SEND, "", false).await;
        debug!("[Bridge] Sending key {} to {}", key, address);
        if let Err(e) = self.cec.key(address, &key).await {
            error!("[Bridge] Could not send key {} to {}: {}", key, address, e);
        }
    }
}
