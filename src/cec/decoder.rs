//! Turns traced inbound frames into CEC events.

use super::frame::{Frame, Opcode};
use super::{Command, KeyPress, SourceActivation};
use crate::message::{Direction, TrafficLine};
use std::time::Instant;

/// Events decoded from a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CecEvent {
    Command(Command),
    KeyPress(KeyPress),
    SourceActivation(SourceActivation),
}

/// Stateful decoder: tracks the key currently held so that a release can be
/// attributed to it.
#[derive(Debug, Default)]
pub struct TrafficDecoder {
    held: Option<(u8, Instant)>,
}

impl TrafficDecoder {
    pub fn decode(&mut self, line: &TrafficLine<'_>, now: Instant) -> Vec<CecEvent> {
        if line.direction != Direction::Inbound {
            return Vec::new();
        }
        let Some(frame) = Frame::from_bytes(&line.bytes()) else {
            return Vec::new();
        };
        let Some(opcode) = frame.opcode else {
            return Vec::new();
        };

        let mut events = vec![CecEvent::Command(Command {
            command_string: frame.describe(),
        })];

        match Opcode::from_repr(opcode) {
            Some(Opcode::UserControlPressed) => {
                if let Some(&key_code) = frame.operands.first() {
                    events.push(CecEvent::KeyPress(self.press(key_code, now)));
                }
            }
            Some(Opcode::UserControlRelease) => {
                if let Some((key_code, _)) = self.held.take() {
                    events.push(CecEvent::KeyPress(KeyPress {
                        key_code,
                        duration: 0,
                    }));
                }
            }
            Some(Opcode::ActiveSource) => {
                events.push(CecEvent::SourceActivation(SourceActivation {
                    logical_address: frame.initiator,
                    state: true,
                }));
            }
            Some(Opcode::InactiveSource) => {
                events.push(CecEvent::SourceActivation(SourceActivation {
                    logical_address: frame.initiator,
                    state: false,
                }));
            }
            _ => {}
        }
        events
    }

    /// A held key reports the milliseconds since it went down, never zero.
    fn press(&mut self, key_code: u8, now: Instant) -> KeyPress {
        let since = match self.held {
            Some((held_code, since)) if held_code == key_code => since,
            _ => {
                self.held = Some((key_code, now));
                now
            }
        };
        let elapsed = now.saturating_duration_since(since).as_millis();
        KeyPress {
            key_code,
            duration: u32::try_from(elapsed).unwrap_or(u32::MAX).max(1),
        }
    }
}
