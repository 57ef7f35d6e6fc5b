//! Device configuration
//!
//! Network credentials and message-bus parameters for the RelayNode.
//! Persisted by the NVS adapter; the control loop holds a cached copy.

use serde::{Deserialize, Serialize};

use crate::adapters::utils::is_printable_ascii;
use crate::app::ports::ConfigError;
use crate::error::LinkError;

/// Default MQTT broker port.
pub const DEFAULT_BUS_PORT: u16 = 1883;

// ───────────────────────────────────────────────────────────────
// WiFi credentials
// ───────────────────────────────────────────────────────────────

/// Station-mode credentials.  An empty SSID means "not provisioned".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl WifiCredentials {
    /// Validate and build credentials.
    ///
    /// SSID: 1-32 printable ASCII bytes.  Password: empty (open network)
    /// or 8-64 bytes (WPA2).
    pub fn new(ssid: &str, password: &str) -> Result<Self, LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut creds = Self::default();
        creds.ssid.push_str(ssid).map_err(|_| LinkError::InvalidSsid)?;
        creds
            .password
            .push_str(password)
            .map_err(|_| LinkError::InvalidPassword)?;
        Ok(creds)
    }

    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }
}

pub(crate) fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Message-bus configuration
// ───────────────────────────────────────────────────────────────

/// MQTT broker and topic settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Credentials are sent only when `user` is non-empty.
    pub user: String,
    pub pass: String,
    /// Base command topic.  State and input topics derive from it.
    pub cmd_topic: String,
    /// Explicit state topic; empty means `<cmd_topic>/state`.
    pub state_topic: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: DEFAULT_BUS_PORT,
            user: String::new(),
            pass: String::new(),
            cmd_topic: String::new(),
            state_topic: String::new(),
        }
    }
}

impl BusConfig {
    /// Bus features are active only when enabled, a host is set and a
    /// command topic is set.
    pub fn is_ready(&self) -> bool {
        self.enabled && !self.host.is_empty() && !self.cmd_topic.is_empty()
    }

    /// Reject values that would never work against a broker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationFailed("port must be 1-65535"));
        }
        if !is_valid_topic(&self.cmd_topic) || !is_valid_topic(&self.state_topic) {
            return Err(ConfigError::ValidationFailed("topic must not contain wildcards"));
        }
        Ok(())
    }
}

/// Publish topics may not carry the `+`/`#` subscription wildcards.
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.contains(['+', '#'])
}

// ───────────────────────────────────────────────────────────────
// Aggregate
// ───────────────────────────────────────────────────────────────

/// Everything the device persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub wifi: WifiCredentials,
    pub bus: BusConfig,
}
