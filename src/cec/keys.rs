//! Remote control key tokens.
//!
//! A key token is either a hex user-control code (`0x41`) or the name of a
//! user-control code, matched case-insensitively (`VolumeUp`, `select`).

use crate::error::{BridgeError, Result};
use std::str::FromStr;
use strum::{EnumString, FromRepr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, FromRepr)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum UserControlCode {
    Select = 0x00,
    Up = 0x01,
    Down = 0x02,
    Left = 0x03,
    Right = 0x04,
    RightUp = 0x05,
    RightDown = 0x06,
    LeftUp = 0x07,
    LeftDown = 0x08,
    RootMenu = 0x09,
    SetupMenu = 0x0A,
    ContentsMenu = 0x0B,
    FavoriteMenu = 0x0C,
    Exit = 0x0D,
    Number0 = 0x20,
    Number1 = 0x21,
    Number2 = 0x22,
    Number3 = 0x23,
    Number4 = 0x24,
    Number5 = 0x25,
    Number6 = 0x26,
    Number7 = 0x27,
    Number8 = 0x28,
    Number9 = 0x29,
    Dot = 0x2A,
    Enter = 0x2B,
    Clear = 0x2C,
    ChannelUp = 0x30,
    ChannelDown = 0x31,
    PreviousChannel = 0x32,
    SoundSelect = 0x33,
    InputSelect = 0x34,
    DisplayInformation = 0x35,
    Help = 0x36,
    PageUp = 0x37,
    PageDown = 0x38,
    Power = 0x40,
    VolumeUp = 0x41,
    VolumeDown = 0x42,
    Mute = 0x43,
    Play = 0x44,
    Stop = 0x45,
    Pause = 0x46,
    Record = 0x47,
    Rewind = 0x48,
    FastForward = 0x49,
    Eject = 0x4A,
    Forward = 0x4B,
    Backward = 0x4C,
    Angle = 0x50,
    SubPicture = 0x51,
    ElectronicProgramGuide = 0x53,
    PowerToggle = 0x6B,
    PowerOff = 0x6C,
    PowerOn = 0x6D,
    F1Blue = 0x71,
    F2Red = 0x72,
    F3Green = 0x73,
    F4Yellow = 0x74,
}

/// Resolve a key token to its user-control code.
pub fn parse_key(token: &str) -> Result<u8> {
    let token = token.trim();
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        if hex.len() == 2 {
            return u8::from_str_radix(hex, 16)
                .map_err(|_| BridgeError::InvalidKey(token.to_string()));
        }
        return Err(BridgeError::InvalidKey(token.to_string()));
    }

    UserControlCode::from_str(token)
        .map(|code| code as u8)
        .map_err(|_| BridgeError::InvalidKey(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_hex_token() {
        assert_eq!(assert_ok!(parse_key("0x41")), 0x41);
        assert_eq!(assert_ok!(parse_key("0X0d")), 0x0D);
    }

    #[test]
    fn test_named_token_is_case_insensitive() {
        assert_eq!(assert_ok!(parse_key("VolumeUp")), 0x41);
        assert_eq!(assert_ok!(parse_key("volumeup")), 0x41);
        assert_eq!(assert_ok!(parse_key("SELECT")), 0x00);
    }

    #[test]
    fn test_invalid_tokens() {
        assert_err!(parse_key("0x4"));
        assert_err!(parse_key("0x411"));
        assert_err!(parse_key("0xZZ"));
        assert_err!(parse_key("launch-rocket"));
    }

    #[test]
    fn test_from_repr() {
        assert_eq!(UserControlCode::from_repr(0x6D), Some(UserControlCode::PowerOn));
    }
}
