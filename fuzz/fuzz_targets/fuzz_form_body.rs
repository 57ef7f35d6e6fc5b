//! Fuzz target: form-encoded request bodies
//!
//! Drives arbitrary text through the HTTP form decoder and the relay /
//! MQTT settings parsers.  None may panic, and an accepted settings form
//! never carries wildcard topics.
//!
//! cargo fuzz run fuzz_form_body

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaynode::adapters::http::{decode_form, mqtt_update, relay_command, WifiForm};
use relaynode::app::commands::AppCommand;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = core::str::from_utf8(data) else {
        return;
    };

    let _: WifiForm = decode_form(body);
    let _ = relay_command(body);

    if let Ok(AppCommand::UpdateBusConfig(update)) = mqtt_update(body) {
        for topic in [&update.cmd_topic, &update.state_topic] {
            assert!(!topic.contains('#') && !topic.contains('+'));
        }
    }
});
