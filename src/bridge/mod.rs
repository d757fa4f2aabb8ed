//! The CEC <-> MQTT bridge.
//!
//! Construction subscribes the two control topics and publishes a retained
//! snapshot of every device on the bus. After that the caller runs the four
//! forwarding loops (see `forward.rs`) and routes inbound MQTT messages to
//! [`Bridge::handle_message`] (see `commands.rs`).

mod commands;
mod forward;
#[cfg(test)]
mod mock;

pub use commands::KeySendRequest;

use crate::cec::CecConnection;
use crate::error::{BridgeError, Result};
use crate::mqtt::MqttTransport;
use crate::topic::{self, SourceAttribute};
use log::{info, warn};
use tokio::sync::Mutex;

pub struct Bridge<C, M> {
    cec: C,
    mqtt: M,
    topic_prefix: String,
    /// Serializes every outbound CEC call.
    send_lock: Mutex<()>,
}

impl<C: CecConnection, M: MqttTransport> Bridge<C, M> {
    /// Create the bridge: subscribe the control topics, then publish the
    /// device snapshot.
    ///
    /// A failed subscription is fatal since the bridge would be deaf to
    /// control requests.
    pub async fn new(cec: C, mqtt: M, topic_prefix: impl Into<String>) -> Result<Self> {
        info!("[Bridge] Creating CEC MQTT bridge");
        let bridge = Self {
            cec,
            mqtt,
            topic_prefix: topic_prefix.into(),
            send_lock: Mutex::new(()),
        };

        for subtopic in [topic::KEY_SEND, topic::COMMAND_TX] {
            let topic = bridge.topic(subtopic);
            bridge
                .mqtt
                .subscribe(&topic)
                .await
                .map_err(|e| BridgeError::SubscribeFailed {
                    topic: topic.clone(),
                    reason: e.to_string(),
                })?;
        }

        bridge.publish_snapshot().await;
        info!("[Bridge] CEC MQTT bridge initialized");
        Ok(bridge)
    }

    /// The CEC connection the bridge drives.
    pub fn cec(&self) -> &C {
        &self.cec
    }

    /// Effective broker topic for a logical subtopic.
    pub fn topic(&self, subtopic: &str) -> String {
        topic::namespace(&self.topic_prefix, subtopic)
    }

    async fn publish(&self, subtopic: &str, payload: &str, retain: bool) -> Result<()> {
        self.mqtt
            .publish(&self.topic(subtopic), payload, retain)
            .await
    }

    /// Publish and log a failure instead of returning it.
    async fn publish_logged(&self, subtopic: &str, payload: &str, retain: bool) {
        if let Err(e) = self.publish(subtopic, payload, retain).await {
            warn!("[Bridge] Failed to publish to {}: {}", subtopic, e);
        }
    }

    /// Publish retained `active`, `name` and `power` topics for every device.
    async fn publish_snapshot(&self) {
        let devices = match self.cec.list().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("[Bridge] Could not list CEC devices: {}", e);
                return;
            }
        };

        for (key, device) in devices {
            info!(
                "[Bridge] Connected device {}: logical address {}, active source {}, \
                 OSD name {:?}, physical address {}, power status {}, vendor {}",
                key,
                device.logical_address,
                device.active_source,
                device.osd_name,
                device.physical_address,
                device.power_status,
                device.vendor
            );
            let address = device.logical_address;
            self.publish_logged(
                &topic::source(address, SourceAttribute::Active),
                &device.active_source.to_string(),
                true,
            )
            .await;
            self.publish_logged(
                &topic::source(address, SourceAttribute::Name),
                &device.osd_name,
                true,
            )
            .await;
            self.publish_logged(
                &topic::source(address, SourceAttribute::Power),
                &device.power_status,
                true,
            )
            .await;
        }
    }
}
