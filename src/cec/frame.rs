//! CEC frame layout and opcode names.

use strum::{Display, FromRepr};

/// CEC opcodes, rendered in their conventional upper-case form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Opcode {
    FeatureAbort = 0x00,
    ImageViewOn = 0x04,
    TunerStepIncrement = 0x05,
    TunerStepDecrement = 0x06,
    TunerDeviceStatus = 0x07,
    GiveTunerDeviceStatus = 0x08,
    RecordOn = 0x09,
    RecordStatus = 0x0A,
    RecordOff = 0x0B,
    TextViewOn = 0x0D,
    RecordTvScreen = 0x0F,
    GiveDeckStatus = 0x1A,
    DeckStatus = 0x1B,
    SetMenuLanguage = 0x32,
    Standby = 0x36,
    Play = 0x41,
    DeckControl = 0x42,
    UserControlPressed = 0x44,
    UserControlRelease = 0x45,
    GiveOsdName = 0x46,
    SetOsdName = 0x47,
    SetOsdString = 0x64,
    SystemAudioModeRequest = 0x70,
    GiveAudioStatus = 0x71,
    SetSystemAudioMode = 0x72,
    ReportAudioStatus = 0x7A,
    GiveSystemAudioModeStatus = 0x7D,
    SystemAudioModeStatus = 0x7E,
    RoutingChange = 0x80,
    RoutingInformation = 0x81,
    ActiveSource = 0x82,
    GivePhysicalAddress = 0x83,
    ReportPhysicalAddress = 0x84,
    RequestActiveSource = 0x85,
    SetStreamPath = 0x86,
    DeviceVendorId = 0x87,
    VendorCommand = 0x89,
    VendorRemoteButtonDown = 0x8A,
    VendorRemoteButtonUp = 0x8B,
    GiveDeviceVendorId = 0x8C,
    MenuRequest = 0x8D,
    MenuStatus = 0x8E,
    GiveDevicePowerStatus = 0x8F,
    ReportPowerStatus = 0x90,
    GetMenuLanguage = 0x91,
    InactiveSource = 0x9D,
    CecVersion = 0x9E,
    GetCecVersion = 0x9F,
    VendorCommandWithId = 0xA0,
    Abort = 0xFF,
}

/// Human readable name of a logical address.
pub fn logical_address_name(address: u8) -> &'static str {
    match address & 0x0F {
        0x0 => "TV",
        0x1 => "Recorder 1",
        0x2 => "Recorder 2",
        0x3 => "Tuner 1",
        0x4 => "Playback 1",
        0x5 => "Audio",
        0x6 => "Tuner 2",
        0x7 => "Tuner 3",
        0x8 => "Playback 2",
        0x9 => "Recorder 3",
        0xA => "Tuner 4",
        0xB => "Playback 3",
        0xC => "Reserved 1",
        0xD => "Reserved 2",
        0xE => "Free use",
        _ => "Broadcast",
    }
}

/// A single CEC frame: header block plus optional opcode and operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub initiator: u8,
    pub destination: u8,
    pub opcode: Option<u8>,
    pub operands: Vec<u8>,
}

impl Frame {
    /// Split raw frame bytes. Returns `None` for an empty frame.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&header, rest) = bytes.split_first()?;
        let (opcode, operands) = match rest.split_first() {
            Some((&opcode, operands)) => (Some(opcode), operands.to_vec()),
            None => (None, Vec::new()),
        };
        Some(Self {
            initiator: header >> 4,
            destination: header & 0x0F,
            opcode,
            operands,
        })
    }

    /// Describe the frame as `<initiator> -> <destination>: <OPCODE> <operands>`.
    ///
    /// A frame without opcode is a polling message.
    pub fn describe(&self) -> String {
        let opcode = match self.opcode {
            None => "POLL".to_string(),
            Some(raw) => match Opcode::from_repr(raw) {
                Some(opcode) => opcode.to_string(),
                None => format!("0x{:02X}", raw),
            },
        };

        let mut description = format!(
            "{} -> {}: {}",
            logical_address_name(self.initiator),
            logical_address_name(self.destination),
            opcode
        );
        if !self.operands.is_empty() {
            let operands: Vec<String> = self.operands.iter().map(|b| format!("{:02X}", b)).collect();
            description.push(' ');
            description.push_str(&operands.join(":"));
        }
        description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_names() {
        assert_eq!(Opcode::ActiveSource.to_string(), "ACTIVE_SOURCE");
        assert_eq!(Opcode::GiveOsdName.to_string(), "GIVE_OSD_NAME");
        assert_eq!(Opcode::from_repr(0x44), Some(Opcode::UserControlPressed));
        assert_eq!(Opcode::from_repr(0x01), None);
    }

    #[test]
    fn test_split_header() {
        let frame = Frame::from_bytes(&[0x0F, 0x82, 0x10, 0x00]).unwrap();
        assert_eq!(frame.initiator, 0x0);
        assert_eq!(frame.destination, 0xF);
        assert_eq!(frame.opcode, Some(0x82));
        assert_eq!(frame.operands, vec![0x10, 0x00]);
    }

    #[test]
    fn test_empty_frame() {
        assert!(Frame::from_bytes(&[]).is_none());
    }

    #[test]
    fn test_describe() {
        let frame = Frame::from_bytes(&[0x0F, 0x82, 0x10, 0x00]).unwrap();
        assert_eq!(frame.describe(), "TV -> Broadcast: ACTIVE_SOURCE 10:00");

        let frame = Frame::from_bytes(&[0x40, 0x36]).unwrap();
        assert_eq!(frame.describe(), "Playback 1 -> TV: STANDBY");
    }

    #[test]
    fn test_describe_poll_and_unknown_opcode() {
        let frame = Frame::from_bytes(&[0x14]).unwrap();
        assert_eq!(frame.describe(), "Recorder 1 -> Playback 1: POLL");

        let frame = Frame::from_bytes(&[0x05, 0xC0]).unwrap();
        assert_eq!(frame.describe(), "TV -> Audio: 0xC0");
    }
}
