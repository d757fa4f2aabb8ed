//! MQTT side of the bridge.
//!
//! [`MqttTransport`] is what the bridge publishes and subscribes through;
//! [`MqttClient`] owns the rumqttc event loop and delivers inbound messages.

mod client;

pub use client::{MqttClient, MqttMessage};

use crate::error::Result;
use async_trait::async_trait;
use log::debug;
use rumqttc::{AsyncClient, QoS};

/// Publish/subscribe operations the bridge needs from a broker connection.
#[async_trait]
pub trait MqttTransport: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()>;

    /// Subscribe with at-least-once delivery.
    async fn subscribe(&self, topic: &str) -> Result<()>;
}

#[async_trait]
impl MqttTransport for AsyncClient {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        debug!("[MQTT] Publishing to {} (retain={}): {}", topic, retain, payload);
        AsyncClient::publish(self, topic, QoS::AtMostOnce, retain, payload.as_bytes()).await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        debug!("[MQTT] Subscribing to {}", topic);
        AsyncClient::subscribe(self, topic, QoS::AtLeastOnce).await?;
        Ok(())
    }
}
