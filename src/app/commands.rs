//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (HTTP handlers,
//! MQTT command topic) that the [`AppService`](super::service::AppService)
//! interprets on the control-loop thread.

use crate::config::{BusConfig, DEFAULT_BUS_PORT};
use crate::control::RelayState;

/// Where a relay intent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Http,
    Bus,
}

/// A request to set the relay.  Judged against the physical input on the
/// next enforcement pass; never applied directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayIntent {
    pub state: RelayState,
    pub source: CommandSource,
}

/// Replacement bus settings as submitted by the web UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfigUpdate {
    pub enabled: bool,
    pub host: String,
    /// Out-of-range or missing ports fall back to the default.
    pub port: Option<u16>,
    pub user: String,
    /// `None` (or empty) keeps the stored password.
    pub pass: Option<String>,
    pub cmd_topic: String,
    pub state_topic: String,
}

impl BusConfigUpdate {
    /// Merge into the current settings.
    pub fn apply_to(&self, current: &BusConfig) -> BusConfig {
        let pass = match &self.pass {
            Some(p) if !p.is_empty() => p.clone(),
            _ => current.pass.clone(),
        };
        BusConfig {
            enabled: self.enabled,
            host: self.host.trim().to_owned(),
            port: self.port.filter(|p| *p != 0).unwrap_or(DEFAULT_BUS_PORT),
            user: self.user.clone(),
            pass,
            cmd_topic: self.cmd_topic.trim().to_owned(),
            state_topic: self.state_topic.trim().to_owned(),
        }
    }
}

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Propose a relay state.
    SetRelay(RelayIntent),

    /// Replace the bus configuration, persist it, and reconnect.
    UpdateBusConfig(BusConfigUpdate),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update() -> BusConfigUpdate {
        BusConfigUpdate {
            enabled: true,
            host: " broker.lan ".into(),
            port: Some(1884),
            user: "u".into(),
            pass: None,
            cmd_topic: "home/relay1/cmd".into(),
            state_topic: String::new(),
        }
    }

    #[test]
    fn empty_password_keeps_stored_one() {
        let current = BusConfig {
            pass: "secret".into(),
            ..BusConfig::default()
        };
        let mut u = update();
        assert_eq!(u.apply_to(&current).pass, "secret");
        u.pass = Some(String::new());
        assert_eq!(u.apply_to(&current).pass, "secret");
        u.pass = Some("fresh".into());
        assert_eq!(u.apply_to(&current).pass, "fresh");
    }

    #[test]
    fn port_falls_back_to_default() {
        let mut u = update();
        assert_eq!(u.apply_to(&BusConfig::default()).port, 1884);
        u.port = None;
        assert_eq!(u.apply_to(&BusConfig::default()).port, DEFAULT_BUS_PORT);
        u.port = Some(0);
        assert_eq!(u.apply_to(&BusConfig::default()).port, DEFAULT_BUS_PORT);
    }

    #[test]
    fn host_is_trimmed() {
        assert_eq!(update().apply_to(&BusConfig::default()).host, "broker.lan");
    }
}
