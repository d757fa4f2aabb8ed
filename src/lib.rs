//! CEC MQTT bridge library.
//!
//! Exposes the devices on an HDMI-CEC bus as MQTT topics and turns MQTT
//! control messages into CEC commands and key presses.

pub mod bridge;
pub mod cec;
pub mod config;
pub mod error;
pub mod instance_lock;
pub mod message;
pub mod mqtt;
pub mod topic;
