//! WiFi adapter.
//!
//! Implements [`ConnectivityPort`], the hexagonal boundary for network
//! connectivity used by the boot-time mode decision.  Station joins are
//! started non-blocking; the mode controller polls [`is_joined`] against
//! its own deadline.  The setup access point is open (no password).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! [`is_joined`]: ConnectivityPort::is_joined

use core::net::Ipv4Addr;

use log::{info, warn};

use crate::app::ports::ConnectivityPort;
use crate::config::WifiCredentials;
use crate::error::LinkError;

#[cfg(target_os = "espidf")]
use embedded_svc::wifi::{AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration};
#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop, hal::modem::Modem, nvs::EspDefaultNvsPartition, wifi::EspWifi,
};

// ───────────────────────────────────────────────────────────────
// Link role
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    Idle,
    Station,
    AccessPoint,
}

/// Simulated AP address (matches the ESP-IDF default soft-AP subnet).
#[cfg(not(target_os = "espidf"))]
pub const SIM_AP_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 71, 1);
#[cfg(not(target_os = "espidf"))]
pub const SIM_STA_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    role: LinkRole,
    hostname: heapless::String<32>,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    /// Simulation: `Some(n)` joins after `n` failed polls, `None` never joins.
    #[cfg(not(target_os = "espidf"))]
    sim_join_after_polls: Option<u32>,
    #[cfg(not(target_os = "espidf"))]
    sim_polls: u32,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self, esp_idf_svc::sys::EspError> {
        let wifi = EspWifi::new(modem, sysloop, Some(nvs))?;
        Ok(Self {
            role: LinkRole::Idle,
            hostname: heapless::String::new(),
            wifi,
        })
    }

    /// Simulation: a link that joins after `join_after_polls` polls.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(join_after_polls: Option<u32>) -> Self {
        Self {
            role: LinkRole::Idle,
            hostname: heapless::String::new(),
            sim_join_after_polls: join_after_polls,
            sim_polls: 0,
        }
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_set_hostname(&mut self, hostname: &str) -> Result<(), LinkError> {
        self.wifi
            .sta_netif_mut()
            .set_hostname(hostname)
            .map_err(|_| LinkError::JoinFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_set_hostname(&mut self, hostname: &str) -> Result<(), LinkError> {
        info!("WiFi(sim): hostname '{}'", hostname);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_begin_join(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        let auth_method = if credentials.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: credentials
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| LinkError::InvalidSsid)?,
            password: credentials
                .password
                .as_str()
                .try_into()
                .map_err(|_| LinkError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });
        self.wifi
            .set_configuration(&config)
            .map_err(|_| LinkError::JoinFailed)?;
        self.wifi.start().map_err(|_| LinkError::JoinFailed)?;
        self.wifi.connect().map_err(|_| LinkError::JoinFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin_join(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        info!("WiFi(sim): joining '{}'", credentials.ssid);
        self.sim_polls = 0;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_joined(&mut self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_joined(&mut self) -> bool {
        let joined = self.sim_join_after_polls.is_some_and(|n| self.sim_polls >= n);
        self.sim_polls = self.sim_polls.saturating_add(1);
        joined
    }

    #[cfg(target_os = "espidf")]
    fn platform_leave(&mut self) {
        let _ = self.wifi.disconnect();
        let _ = self.wifi.stop();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_leave(&mut self) {
        info!("WiFi(sim): left");
    }

    #[cfg(target_os = "espidf")]
    fn platform_start_ap(&mut self, ssid: &str) -> Result<(), LinkError> {
        let config = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: ssid.try_into().map_err(|_| LinkError::InvalidSsid)?,
            auth_method: AuthMethod::None,
            channel: 1,
            ..Default::default()
        });
        self.wifi
            .set_configuration(&config)
            .map_err(|_| LinkError::AccessPointFailed)?;
        self.wifi.start().map_err(|_| LinkError::AccessPointFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start_ap(&mut self, ssid: &str) -> Result<(), LinkError> {
        info!("WiFi(sim): AP '{}' up", ssid);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        let netif = match self.role {
            LinkRole::Station => self.wifi.sta_netif(),
            LinkRole::AccessPoint => self.wifi.ap_netif(),
            LinkRole::Idle => return None,
        };
        netif.get_ip_info().ok().map(|info| info.ip)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        match self.role {
            LinkRole::Station => Some(SIM_STA_ADDR),
            LinkRole::AccessPoint => Some(SIM_AP_ADDR),
            LinkRole::Idle => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn set_hostname(&mut self, hostname: &str) -> Result<(), LinkError> {
        self.hostname.clear();
        self.hostname
            .push_str(hostname)
            .map_err(|_| LinkError::JoinFailed)?;
        self.platform_set_hostname(hostname)
    }

    fn begin_join(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        if !credentials.is_configured() {
            return Err(LinkError::NoCredentials);
        }
        info!("WiFi: joining '{}' as '{}'", credentials.ssid, self.hostname);
        self.role = LinkRole::Station;
        self.platform_begin_join(credentials).inspect_err(|e| {
            warn!("WiFi: join request rejected: {}", e);
            self.role = LinkRole::Idle;
        })
    }

    fn is_joined(&mut self) -> bool {
        self.role == LinkRole::Station && self.platform_is_joined()
    }

    fn leave(&mut self) {
        self.platform_leave();
        self.role = LinkRole::Idle;
    }

    fn start_access_point(&mut self, ssid: &str) -> Result<(), LinkError> {
        self.platform_start_ap(ssid)?;
        self.role = LinkRole::AccessPoint;
        info!("WiFi: setup AP '{}' up at {:?}", ssid, self.platform_ip());
        Ok(())
    }

    fn ip_address(&self) -> Option<Ipv4Addr> {
        self.platform_ip()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
