//! Recording collaborators for bridge tests.

use crate::cec::{CecConnection, DeviceInfo};
use crate::error::{BridgeError, Result};
use crate::mqtt::MqttTransport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Everything the collaborators were asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Subscribe(String),
    Publish {
        topic: String,
        payload: String,
        retain: bool,
    },
    Transmit(String),
    Key(u8, String),
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Record>>>);

impl Journal {
    fn push(&self, record: Record) {
        self.0.lock().push(record);
    }

    pub fn records(&self) -> Vec<Record> {
        self.0.lock().clone()
    }

    pub fn publishes(&self) -> Vec<(String, String, bool)> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                Record::Publish {
                    topic,
                    payload,
                    retain,
                } => Some((topic, payload, retain)),
                _ => None,
            })
            .collect()
    }

    pub fn cec_calls(&self) -> usize {
        self.records()
            .iter()
            .filter(|record| matches!(record, Record::Transmit(_) | Record::Key(..)))
            .count()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

pub fn device(logical_address: u8, active_source: bool, osd_name: &str, power: &str) -> DeviceInfo {
    DeviceInfo {
        logical_address,
        active_source,
        osd_name: osd_name.to_string(),
        physical_address: format!("{}.0.0.0", logical_address),
        power_status: power.to_string(),
        vendor: "Unknown".to_string(),
    }
}

pub struct MockCec {
    devices: HashMap<String, DeviceInfo>,
    journal: Journal,
    pub fail_list: bool,
    /// How long each transmit/key call takes.
    pub delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockCec {
    pub fn with_mqtt(devices: HashMap<String, DeviceInfo>) -> (MockCec, MockMqtt, Journal) {
        let journal = Journal::default();
        let cec = MockCec {
            devices,
            journal: journal.clone(),
            fail_list: false,
            delay: Duration::from_millis(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        };
        let mqtt = MockMqtt {
            journal: journal.clone(),
            fail_subscribe: false,
            stall_publish: false,
        };
        (cec, mqtt, journal)
    }

    /// Highest number of CEC calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn call(&self, record: Record) {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.journal.push(record);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CecConnection for MockCec {
    async fn list(&self) -> Result<HashMap<String, DeviceInfo>> {
        if self.fail_list {
            return Err(BridgeError::CecScanTimeout(30));
        }
        Ok(self.devices.clone())
    }

    async fn transmit(&self, command: &str) -> Result<()> {
        self.call(Record::Transmit(command.to_string())).await;
        Ok(())
    }

    async fn key(&self, address: u8, key: &str) -> Result<()> {
        self.call(Record::Key(address, key.to_string())).await;
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

pub struct MockMqtt {
    journal: Journal,
    fail_subscribe: bool,
    /// Publishes are recorded and then never complete.
    stall_publish: bool,
}

impl MockMqtt {
    pub fn failing_subscribe(journal: Journal) -> Self {
        Self {
            journal,
            fail_subscribe: true,
            stall_publish: false,
        }
    }

    /// A broker that accepts subscriptions but never finishes a publish.
    pub fn stalled(journal: Journal) -> Self {
        Self {
            journal,
            fail_subscribe: false,
            stall_publish: true,
        }
    }
}

#[async_trait]
impl MqttTransport for MockMqtt {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        self.journal.push(Record::Publish {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
        });
        if self.stall_publish {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        if self.fail_subscribe {
            return Err(BridgeError::MqttConnectFailed {
                broker: "tcp://mock:1883".to_string(),
                reason: "connection lost".to_string(),
            });
        }
        self.journal.push(Record::Subscribe(topic.to_string()));
        Ok(())
    }
}
