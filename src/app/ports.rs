//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (GPIO, network link, MQTT client, NVS, clock) implement
//! these traits.  The [`AppService`](super::service::AppService) and the
//! network mode controller consume them via generics, so the domain core
//! never touches hardware directly.

use core::net::Ipv4Addr;

use embedded_hal::digital::PinState;

use crate::bus::{BusMessage, ConnectOptions};
use crate::config::{DeviceConfig, WifiCredentials};
use crate::error::{BusError, LinkError};

// ───────────────────────────────────────────────────────────────
// GPIO ports (driven adapter: hardware ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Raw dry-contact line, sampled once per tick.
pub trait InputPort {
    fn read(&mut self) -> PinState;
}

/// Physical relay output.  The domain already applied polarity.
pub trait RelayOutputPort {
    fn write(&mut self, level: PinState);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists device configuration.
///
/// Implementations MUST validate before persisting; invalid values are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration.  Missing sections come back as defaults.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.  Wraps after ~49 days; callers use
/// wrapping arithmetic.
pub trait TimePort {
    fn now_ms(&self) -> u32;
    fn sleep_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (driven adapter: domain ↔ WiFi)
// ───────────────────────────────────────────────────────────────

/// Network link primitives used by the boot-time mode decision.
pub trait ConnectivityPort {
    /// Set the station hostname.  Must precede [`begin_join`](Self::begin_join).
    fn set_hostname(&mut self, hostname: &str) -> Result<(), LinkError>;

    /// Start joining the configured network.  Non-blocking; poll
    /// [`is_joined`](Self::is_joined) for completion.
    fn begin_join(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError>;

    /// Associated and holding an IP address.
    fn is_joined(&mut self) -> bool;

    /// Abandon a join attempt or drop the station link.
    fn leave(&mut self);

    /// Bring up the open setup access point.
    fn start_access_point(&mut self, ssid: &str) -> Result<(), LinkError>;

    /// Current address (station IP or AP IP).
    fn ip_address(&self) -> Option<Ipv4Addr>;
}

// ───────────────────────────────────────────────────────────────
// Bus client port (driven adapter: domain ↔ MQTT)
// ───────────────────────────────────────────────────────────────

/// Minimal publish/subscribe client.
///
/// `connect` only initiates the session; [`is_connected`](Self::is_connected)
/// reports when the broker acknowledged it.  Inbound messages are queued by
/// the adapter and drained with [`poll_message`](Self::poll_message).
pub trait BusClient {
    fn connect(&mut self, options: &ConnectOptions) -> Result<(), BusError>;
    fn is_connected(&self) -> bool;
    fn disconnect(&mut self);
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError>;
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BusError>;
    fn poll_message(&mut self) -> Option<BusMessage>;
}

// ───────────────────────────────────────────────────────────────
// System port
// ───────────────────────────────────────────────────────────────

/// Device-level actions.
pub trait SystemPort {
    /// Restart the device after `delay_ms` so a pending response can flush.
    fn schedule_restart(&mut self, delay_ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
