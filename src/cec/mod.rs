//! CEC side of the bridge.
//!
//! [`CecConnection`] is the seam between the bridge and whatever drives the
//! HDMI-CEC adapter. Events flow the other way over four bounded channels
//! created by [`event_channels`]: the backend gets the [`EventSenders`], the
//! forwarding loops get the matching [`EventReceivers`].

mod client;
mod decoder;
mod frame;
mod keys;
mod scan;

pub use client::CecClient;
pub use decoder::{CecEvent, TrafficDecoder};
pub use frame::{Frame, Opcode, logical_address_name};
pub use keys::{UserControlCode, parse_key};
pub use scan::parse_report;

use crate::error::Result;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Capacity of each CEC event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 10;

/// One device as reported by a bus scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub logical_address: u8,
    pub active_source: bool,
    pub osd_name: String,
    pub physical_address: String,
    pub power_status: String,
    pub vendor: String,
}

/// A protocol command observed on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub command_string: String,
}

/// A remote control key event.
///
/// `duration` is zero once the key has been released and non-zero while it is
/// still held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key_code: u8,
    pub duration: u32,
}

/// A device becoming (or ceasing to be) the active source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceActivation {
    pub logical_address: u8,
    pub state: bool,
}

/// Operations the bridge needs from a CEC adapter.
#[async_trait]
pub trait CecConnection: Send + Sync {
    /// Current device table, keyed by device name.
    async fn list(&self) -> Result<HashMap<String, DeviceInfo>>;

    /// Transmit a raw command given as colon separated hex octets.
    async fn transmit(&self, command: &str) -> Result<()>;

    /// Press and release `key` on the device at `address`.
    async fn key(&self, address: u8, key: &str) -> Result<()>;

    /// Close the adapter.
    async fn destroy(&self) -> Result<()>;
}

/// Producer half of the CEC event channels.
#[derive(Debug, Clone)]
pub struct EventSenders {
    commands: mpsc::Sender<Command>,
    key_presses: mpsc::Sender<KeyPress>,
    source_activations: mpsc::Sender<SourceActivation>,
    messages: mpsc::Sender<String>,
}

/// Consumer half of the CEC event channels, one receiver per forwarding loop.
#[derive(Debug)]
pub struct EventReceivers {
    pub commands: mpsc::Receiver<Command>,
    pub key_presses: mpsc::Receiver<KeyPress>,
    pub source_activations: mpsc::Receiver<SourceActivation>,
    pub messages: mpsc::Receiver<String>,
}

/// Create the four bounded event channels.
pub fn event_channels() -> (EventSenders, EventReceivers) {
    let (commands_tx, commands_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (keys_tx, keys_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (sources_tx, sources_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (messages_tx, messages_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let senders = EventSenders {
        commands: commands_tx,
        key_presses: keys_tx,
        source_activations: sources_tx,
        messages: messages_tx,
    };
    let receivers = EventReceivers {
        commands: commands_rx,
        key_presses: keys_rx,
        source_activations: sources_rx,
        messages: messages_rx,
    };
    (senders, receivers)
}

impl EventSenders {
    pub fn command(&self, command: Command) {
        offer(&self.commands, "command", command);
    }

    pub fn key_press(&self, key_press: KeyPress) {
        offer(&self.key_presses, "key press", key_press);
    }

    pub fn source_activation(&self, activation: SourceActivation) {
        offer(&self.source_activations, "source activation", activation);
    }

    pub fn message(&self, message: String) {
        offer(&self.messages, "message", message);
    }
}

/// Hand an event to its channel without ever waiting on a slow consumer.
fn offer<T>(tx: &mpsc::Sender<T>, kind: &str, event: T) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!("[CEC] {} channel full, dropping event", kind);
        }
        Err(TrySendError::Closed(_)) => {
            debug!("[CEC] {} channel closed, dropping event", kind);
        }
    }
}
