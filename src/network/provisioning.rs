//! Provisioning-mode setup surface.
//!
//! The device hosts an open access point named after its device id.  The
//! only writable action is storing station credentials, which is always
//! followed by a restart so the next boot re-runs the join decision.

use core::fmt;

use log::{error, info};

use crate::app::ports::{ConfigPort, SystemPort};
use crate::config::{DeviceConfig, WifiCredentials};
use crate::error::LinkError;

/// Delay between answering the setup request and restarting, so the
/// response reaches the browser.
pub const RESTART_DELAY_MS: u32 = 350;

pub const AP_SSID_PREFIX: &str = "RelayNode-";

/// Open AP name, e.g. `RelayNode-esp32-A1B2C3`.
pub fn ap_ssid(device_id: &str) -> String {
    format!("{AP_SSID_PREFIX}{device_id}")
}

/// User-input errors on the setup form.  No state is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningError {
    SsidRequired,
    SsidInvalid,
    PassInvalid,
}

impl ProvisioningError {
    /// Wire error code for the JSON response.
    pub fn code(self) -> &'static str {
        match self {
            Self::SsidRequired => "ssid_required",
            Self::SsidInvalid => "ssid_invalid",
            Self::PassInvalid => "pass_invalid",
        }
    }
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::error::Error for ProvisioningError {}

impl From<LinkError> for ProvisioningError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::InvalidPassword => Self::PassInvalid,
            LinkError::NoCredentials => Self::SsidRequired,
            _ => Self::SsidInvalid,
        }
    }
}

/// Store new station credentials and schedule the restart.
///
/// A persistence failure is logged; the restart still happens.
pub fn submit_credentials(
    ssid: Option<&str>,
    password: Option<&str>,
    store: &impl ConfigPort,
    system: &mut impl SystemPort,
) -> Result<(), ProvisioningError> {
    let ssid = ssid.filter(|s| !s.is_empty()).ok_or(ProvisioningError::SsidRequired)?;
    let credentials = WifiCredentials::new(ssid, password.unwrap_or(""))?;

    let mut config: DeviceConfig = store.load().unwrap_or_default();
    config.wifi = credentials;
    match store.save(&config) {
        Ok(()) => info!("provisioning: credentials for '{}' stored", ssid),
        Err(e) => error!("provisioning: saving credentials failed: {}", e),
    }

    system.schedule_restart(RESTART_DELAY_MS);
    Ok(())
}
