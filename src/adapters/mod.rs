//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements         | Connects to                    |
//! |---------------|--------------------|--------------------------------|
//! | `hardware`    | InputPort          | Dry-contact GPIO (pull-up)     |
//! |               | RelayOutputPort    | Relay driver GPIO              |
//! | `log_sink`    | EventSink          | Serial log output              |
//! | `nvs`         | ConfigPort         | NVS / in-memory store          |
//! | `time`        | TimePort           | ESP32 system timer             |
//! | `wifi`        | ConnectivityPort   | ESP-IDF WiFi STA / soft-AP     |
//! | `mqtt`        | BusClient          | ESP-IDF MQTT client            |
//! | `system`      | SystemPort         | `esp_restart`                  |
//! | `http`        | (driving adapter)  | ESP-IDF httpd                  |
//! | `captive_dns` | (driving adapter)  | UDP/53 on the setup AP         |
//! | `mdns`        |                    | ESP-IDF mDNS responder         |
//! | `device_id`   |                    | Factory MAC                    |

pub mod captive_dns;
pub mod device_id;
pub mod hardware;
pub mod http;
pub mod log_sink;
pub mod mdns;
pub mod mqtt;
pub mod nvs;
pub mod system;
pub mod time;
pub(crate) mod utils;
pub mod wifi;
