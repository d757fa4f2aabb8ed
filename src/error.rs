use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Failed to open CEC adapter {port}: {reason}")]
    CecOpenFailed { port: String, reason: String },

    #[error("CEC transmit failed: {0}")]
    CecTransmitFailed(String),

    #[error("CEC bus scan timed out after {0} seconds")]
    CecScanTimeout(u64),

    #[error("CEC connection closed")]
    CecConnectionClosed,

    #[error("Invalid CEC key token: {0}")]
    InvalidKey(String),

    #[error("Failed to connect to MQTT broker {broker}: {reason}")]
    MqttConnectFailed { broker: String, reason: String },

    #[error("Failed to subscribe to {topic}: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),

    #[error(transparent)]
    InstanceLockError(#[from] crate::instance_lock::InstanceLockError),

    #[error(transparent)]
    MqttClientError(#[from] rumqttc::ClientError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
