//! Fuzz target: captive DNS `answer`
//!
//! Arbitrary UDP payloads must never panic the responder.  Any response
//! echoes the query id and carries exactly one question.
//!
//! cargo fuzz run fuzz_dns_query

#![no_main]

use std::net::Ipv4Addr;

use libfuzzer_sys::fuzz_target;
use relaynode::adapters::captive_dns::answer;

fuzz_target!(|data: &[u8]| {
    if let Some(resp) = answer(data, Ipv4Addr::new(192, 168, 71, 1)) {
        assert!(resp.len() >= 12);
        assert_eq!(&resp[0..2], &data[0..2]);
        assert_eq!(&resp[4..6], &[0, 1]);
    }
});
