use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_BROKER_URL: &str = "tcp://localhost:1883";
const DEFAULT_BROKER_PORT: u16 = 1883;

/// Load variables from a `.env` file in the working directory.
/// Variables already present in the environment are left alone.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    let Ok(content) = fs::read_to_string(env_path) else {
        return;
    };

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = unquote(value.trim());

        if std::env::var(key).is_err() {
            // SAFETY: called first thing in main, before any task is spawned
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn unquote(value: &str) -> &str {
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if quoted {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cec: CecConfig,
    pub mqtt: MqttConfig,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CecConfig {
    /// Adapter port, e.g. `/dev/ttyACM0`.
    pub port: String,
    /// OSD name the adapter announces on the bus.
    pub device_name: String,
    /// Logical address used as initiator for key presses.
    pub logical_address: u8,
    /// Path of the libCEC `cec-client` tool.
    pub client_binary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub topic_prefix: String,
    /// Only log raw traffic instead of republishing it on `cec/message`.
    pub log_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cec: CecConfig {
                port: "/dev/ttyACM0".to_string(),
                device_name: "Claes".to_string(),
                logical_address: 1,
                client_binary: "cec-client".to_string(),
            },
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: DEFAULT_BROKER_PORT,
                client_id: "cec-mqtt-bridge".to_string(),
                username: None,
                password: None,
            },
            bridge: BridgeConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // CEC configuration
        if let Ok(port) = std::env::var("CEC_NAME") {
            config.cec.port = port;
        }
        if let Ok(name) = std::env::var("CEC_DEVICE_NAME") {
            config.cec.device_name = name;
        }
        if let Ok(address) = std::env::var("CEC_LOGICAL_ADDRESS")
            && let Ok(a) = address.parse::<u8>()
            && a <= 0x0F
        {
            config.cec.logical_address = a;
        }
        if let Ok(binary) = std::env::var("CEC_CLIENT_BINARY") {
            config.cec.client_binary = binary;
        }

        // MQTT configuration
        if let Ok(url) = std::env::var("MQTT_BROKER") {
            config.mqtt.set_broker_url(&url)?;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }

        // Bridge configuration
        if let Ok(prefix) = std::env::var("TOPIC_PREFIX") {
            config.bridge.topic_prefix = prefix;
        }
        if let Ok(log_only) = std::env::var("CEC_LOG_ONLY")
            && let Ok(l) = log_only.parse()
        {
            config.bridge.log_only = l;
        }

        Ok(config)
    }
}

impl MqttConfig {
    /// Replace host and port with the ones in `url`.
    pub fn set_broker_url(&mut self, url: &str) -> Result<()> {
        let (host, port) = parse_broker_url(url)?;
        self.broker_host = host;
        self.broker_port = port;
        Ok(())
    }

    pub fn broker_url(&self) -> String {
        format!("tcp://{}:{}", self.broker_host, self.broker_port)
    }
}

/// Split a broker URL such as `tcp://localhost:1883` into host and port.
///
/// The scheme may be `tcp://`, `mqtt://` or omitted; the port defaults to 1883.
pub fn parse_broker_url(url: &str) -> Result<(String, u16)> {
    let trimmed = url.trim();
    let address = trimmed
        .strip_prefix("tcp://")
        .or_else(|| trimmed.strip_prefix("mqtt://"))
        .unwrap_or(trimmed)
        .trim_end_matches('/');

    if address.contains("://") {
        return Err(BridgeError::InvalidBrokerUrl(url.to_string()));
    }

    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| BridgeError::InvalidBrokerUrl(url.to_string()))?;
            (host, port)
        }
        None => (address, DEFAULT_BROKER_PORT),
    };

    if host.is_empty() {
        return Err(BridgeError::InvalidBrokerUrl(url.to_string()));
    }
    Ok((host.to_string(), port))
}
