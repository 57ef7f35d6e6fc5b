//! Device identity derived from the ESP32 factory MAC address.
//!
//! Every name the device uses is built from the last three MAC bytes in
//! uppercase hex (`XXYYZZ`).  These are deterministic across reboots
//! (factory-burned eFuse MAC):
//!
//! | Name            | Format                          | Used for             |
//! |-----------------|---------------------------------|----------------------|
//! | device id       | `esp32-XXYYZZ`                  | setup AP SSID        |
//! | hostname        | `relaynode-XXYYZZ`              | STA hostname, mDNS   |
//! | fqdn            | `relaynode-XXYYZZ.local`        | status API           |
//! | MQTT client id  | `relaynode-XXYYZZ-<efuse hex>`  | broker session       |

use core::fmt::Write;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

pub const HOSTNAME_PREFIX: &str = "relaynode-";

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// `XXYYZZ` from the last three MAC bytes.
pub fn short_id(mac: &MacAddress) -> heapless::String<6> {
    let mut id = heapless::String::new();
    let _ = write!(id, "{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

/// Format: `esp32-XXYYZZ`.
pub fn device_id(mac: &MacAddress) -> heapless::String<16> {
    let mut id = heapless::String::new();
    let _ = write!(id, "esp32-{}", short_id(mac));
    id
}

/// Format: `relaynode-XXYYZZ`.
pub fn hostname(mac: &MacAddress) -> heapless::String<24> {
    let mut name = heapless::String::new();
    let _ = write!(name, "{HOSTNAME_PREFIX}{}", short_id(mac));
    name
}

/// Format: `relaynode-XXYYZZ.local`.
pub fn fqdn(mac: &MacAddress) -> String {
    format!("{}.local", hostname(mac))
}

/// Broker client id: hostname plus the low 32 bits of the eFuse MAC read
/// as a little-endian integer, lowercase hex without padding.
pub fn mqtt_client_id(mac: &MacAddress) -> String {
    let efuse_low = u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]);
    format!("{}-{:x}", hostname(mac), efuse_low)
}
