//! Parser for the bus report printed by `cec-client` in response to `scan`.
//!
//! ```text
//! device #0: TV
//! address:       0.0.0.0
//! active source: no
//! vendor:        Samsung
//! osd string:    TV
//! CEC version:   1.4
//! power status:  on
//! language:      eng
//! ```

use super::DeviceInfo;
use std::collections::HashMap;

/// Parse the report lines into a device table keyed by device name.
pub fn parse_report<S: AsRef<str>>(lines: &[S]) -> HashMap<String, DeviceInfo> {
    let mut devices = HashMap::new();
    let mut current: Option<(String, DeviceInfo)> = None;

    for line in lines {
        let line = line.as_ref().trim();

        if let Some(header) = line.strip_prefix("device #") {
            if let Some((name, device)) = current.take() {
                devices.insert(name, device);
            }
            current = parse_header(header);
            continue;
        }

        let Some((_, device)) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "address" => device.physical_address = value,
            "active source" => device.active_source = value == "yes",
            "vendor" => device.vendor = value,
            "osd string" => device.osd_name = value,
            "power status" => device.power_status = value,
            _ => {}
        }
    }

    if let Some((name, device)) = current.take() {
        devices.insert(name, device);
    }
    devices
}

/// `0: TV` -> ("TV", logical address 0). The index is printed in hex.
fn parse_header(header: &str) -> Option<(String, DeviceInfo)> {
    let (index, name) = header.split_once(':')?;
    let logical_address = u8::from_str_radix(index.trim(), 16).ok()?;
    let device = DeviceInfo {
        logical_address,
        ..DeviceInfo::default()
    };
    Some((name.trim().to_string(), device))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "CEC bus information
===================
device #0: TV
address:       0.0.0.0
active source: no
vendor:        Samsung
osd string:    TV
CEC version:   1.4
power status:  on
language:      eng


device #4: Playback 1
address:       1.0.0.0
active source: yes
vendor:        Pulse Eight
osd string:    Claes
CEC version:   1.4
power status:  in transition from standby to on
language:      eng


currently active source: Playback 1 (4)";

    #[test]
    fn test_parse_two_devices() {
        let lines: Vec<&str> = REPORT.lines().collect();
        let devices = parse_report(&lines);
        assert_eq!(devices.len(), 2);

        let tv = &devices["TV"];
        assert_eq!(tv.logical_address, 0);
        assert!(!tv.active_source);
        assert_eq!(tv.physical_address, "0.0.0.0");
        assert_eq!(tv.vendor, "Samsung");
        assert_eq!(tv.osd_name, "TV");
        assert_eq!(tv.power_status, "on");

        let player = &devices["Playback 1"];
        assert_eq!(player.logical_address, 4);
        assert!(player.active_source);
        assert_eq!(player.osd_name, "Claes");
        assert_eq!(player.power_status, "in transition from standby to on");
    }

    #[test]
    fn test_hex_device_index() {
        let devices = parse_report(&["device #b: Playback 3", "osd string: Box"]);
        assert_eq!(devices["Playback 3"].logical_address, 0xB);
    }

    #[test]
    fn test_empty_report() {
        let lines: Vec<String> = Vec::new();
        assert!(parse_report(&lines).is_empty());
    }
}
