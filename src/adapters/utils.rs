//! Shared utilities for adapter-layer validation and decoding.

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E` (space through tilde, inclusive).
///
/// Used to validate WiFi SSID strings submitted through the setup page.
pub(crate) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Parse a loose boolean as the web UI sends it: `1`, `true`, `on`
/// (case-insensitive) are true, everything else is false.
pub(crate) fn parse_flag(s: &str) -> bool {
    let s = s.trim();
    s == "1" || s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("on")
}
