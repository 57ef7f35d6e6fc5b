//! Message payload codec.
//!
//! Inbound: `ON`/`1`/`true` and `OFF`/`0`/`false`, case-insensitive,
//! surrounding whitespace ignored.  Anything else is not a command.
//! Outbound: fixed-case `ON`/`OFF`.

use crate::control::{InputState, RelayState};

pub const ON: &str = "ON";
pub const OFF: &str = "OFF";

/// Parse a command payload.  Unrecognised payloads are normal on shared
/// topics and yield `None`.
pub fn parse_command(payload: &[u8]) -> Option<RelayState> {
    let text = core::str::from_utf8(payload).ok()?.trim();
    if text.eq_ignore_ascii_case(ON) || text == "1" || text.eq_ignore_ascii_case("true") {
        Some(RelayState::On)
    } else if text.eq_ignore_ascii_case(OFF) || text == "0" || text.eq_ignore_ascii_case("false")
    {
        Some(RelayState::Off)
    } else {
        None
    }
}

pub fn relay_payload(state: RelayState) -> &'static str {
    match state {
        RelayState::On => ON,
        RelayState::Off => OFF,
    }
}

/// Published as "circuit energised": a closed contact reads `ON`.
pub fn input_payload(state: InputState) -> &'static str {
    match state {
        InputState::Closed => ON,
        InputState::Open => OFF,
    }
}
