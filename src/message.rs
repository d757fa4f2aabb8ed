//! Classification of raw CEC traffic lines.
//!
//! libCEC traces every frame on the bus as `>> 10:8f` (sent by us) or
//! `<< 01:44:41` (received). Anything else in the trace is plain log text.

use regex::Regex;
use std::sync::LazyLock;

static TRAFFIC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(>>|<<) ([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2})*)")
        .expect("traffic pattern is a valid regex")
});

/// Direction of a traced frame, relative to the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `<<` frames received from the bus.
    Inbound,
    /// `>>` frames the adapter put on the bus.
    Outbound,
}

/// A traffic line split into direction and hex octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficLine<'a> {
    pub direction: Direction,
    /// Colon separated octets without the direction marker, e.g. `10:8F`.
    pub hex: &'a str,
}

impl TrafficLine<'_> {
    /// Decode the hex octets into bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.hex
            .split(':')
            .filter_map(|octet| u8::from_str_radix(octet, 16).ok())
            .collect()
    }
}

/// Classify a raw trace line. Returns `None` for anything that is not traffic.
pub fn classify(line: &str) -> Option<TrafficLine<'_>> {
    let captures = TRAFFIC_PATTERN.captures(line)?;
    let direction = match captures.get(1)?.as_str() {
        "<<" => Direction::Inbound,
        _ => Direction::Outbound,
    };
    let hex = captures.get(2)?.as_str();
    Some(TrafficLine { direction, hex })
}
