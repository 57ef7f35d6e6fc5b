//! Unified error types for the RelayNode firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! boot path's degrade-and-continue handling uniform.  All variants are `Copy`
//! so they can be passed through the control loop without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Network link (station or access point) failed.
    Link(LinkError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Network link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No SSID stored.
    NoCredentials,
    /// SSID failed validation (1-32 printable ASCII bytes).
    InvalidSsid,
    /// Password failed validation (empty or 8-64 bytes).
    InvalidPassword,
    /// The driver rejected the join request.
    JoinFailed,
    /// The access point could not be brought up.
    AccessPointFailed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::JoinFailed => write!(f, "WiFi join failed"),
            Self::AccessPointFailed => write!(f, "access point start failed"),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Message-bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Client could not be created or the broker refused the connection.
    ConnectFailed,
    /// Operation attempted without a live connection.
    NotConnected,
    SubscribeFailed,
    PublishFailed,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "MQTT connect failed"),
            Self::NotConnected => write!(f, "MQTT not connected"),
            Self::SubscribeFailed => write!(f, "MQTT subscribe failed"),
            Self::PublishFailed => write!(f, "MQTT publish failed"),
        }
    }
}

impl std::error::Error for BusError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
