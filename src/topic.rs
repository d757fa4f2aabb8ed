//! MQTT topic layout for the bridge.
//!
//! Every topic below is a logical subtopic; the effective topic on the broker
//! is computed with [`namespace`] from the configured prefix.

pub const COMMAND_RX: &str = "cec/command/rx";
pub const COMMAND_TX: &str = "cec/command/tx";
pub const KEY: &str = "cec/key";
pub const KEY_SEND: &str = "cec/key/send";
pub const MESSAGE: &str = "cec/message";
pub const MESSAGE_HEX_RX: &str = "cec/message/hex/rx";
pub const MESSAGE_HEX_TX: &str = "cec/message/hex/tx";

/// Attribute published per source under `cec/source/<addr>/...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAttribute {
    Active,
    Name,
    Power,
}

impl SourceAttribute {
    fn as_str(self) -> &'static str {
        match self {
            SourceAttribute::Active => "active",
            SourceAttribute::Name => "name",
            SourceAttribute::Power => "power",
        }
    }
}

/// Subtopic for one attribute of the source at `logical_address`.
pub fn source(logical_address: u8, attribute: SourceAttribute) -> String {
    format!("cec/source/{}/{}", logical_address, attribute.as_str())
}

/// Compute the effective topic for `subtopic` under `prefix`.
///
/// A blank prefix (empty or whitespace only) leaves the subtopic untouched.
pub fn namespace(prefix: &str, subtopic: &str) -> String {
    if prefix.trim().is_empty() {
        subtopic.to_string()
    } else {
        format!("{}/{}", prefix, subtopic)
    }
}
