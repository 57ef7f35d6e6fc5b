//! Fuzz target: `parse_command`
//!
//! Feeds arbitrary bytes as an MQTT command payload.  Parsing must never
//! panic, and anything accepted must be one of the known keywords.
//!
//! cargo fuzz run fuzz_command_payload

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaynode::bus::payload::parse_command;

const KEYWORDS: [&str; 6] = ["on", "1", "true", "off", "0", "false"];

fuzz_target!(|data: &[u8]| {
    if parse_command(data).is_some() {
        let text = core::str::from_utf8(data).expect("accepted payload must be UTF-8");
        let word = text.trim().to_ascii_lowercase();
        assert!(KEYWORDS.contains(&word.as_str()), "unexpected keyword {word:?}");
    }
});
