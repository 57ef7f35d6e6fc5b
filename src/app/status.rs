//! Read-side snapshot shared with the HTTP surface.
//!
//! The control loop is the single writer; it republishes the snapshot
//! after every tick.  HTTP handlers only ever lock and clone.

use std::sync::{Arc, Mutex};

use core::net::Ipv4Addr;

use crate::bus::BusState;
use crate::config::BusConfig;
use crate::control::{InputState, RelayState};
use crate::network::OperatingMode;

/// Bus settings with the password reduced to a presence flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusConfigView {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass_set: bool,
    pub cmd_topic: String,
    pub state_topic: String,
}

impl From<&BusConfig> for BusConfigView {
    fn from(c: &BusConfig) -> Self {
        Self {
            enabled: c.enabled,
            host: c.host.clone(),
            port: c.port,
            user: c.user.clone(),
            pass_set: !c.pass.is_empty(),
            cmd_topic: c.cmd_topic.clone(),
            state_topic: c.state_topic.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub relay: RelayState,
    pub input: InputState,
    pub mode: OperatingMode,
    pub bus_state: BusState,
    pub bus: BusConfigView,
    pub ip: Option<Ipv4Addr>,
    /// Fully-qualified mDNS name, e.g. `relaynode-A1B2C3.local`.
    pub mdns: String,
}

impl StatusSnapshot {
    pub fn new(mode: OperatingMode, mdns: String) -> Self {
        Self {
            relay: RelayState::Off,
            input: InputState::Open,
            mode,
            bus_state: BusState::Disconnected,
            bus: BusConfigView::default(),
            ip: None,
            mdns,
        }
    }
}

pub type SharedStatus = Arc<Mutex<StatusSnapshot>>;

pub fn shared(snapshot: StatusSnapshot) -> SharedStatus {
    Arc::new(Mutex::new(snapshot))
}

/// Replace the published snapshot.  A poisoned lock is recovered; the
/// snapshot is plain data with no invariants to break.
pub fn publish(shared: &SharedStatus, snapshot: StatusSnapshot) {
    let mut guard = shared.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    *guard = snapshot;
}

/// Clone the current snapshot.
pub fn read(shared: &SharedStatus) -> StatusSnapshot {
    shared
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
}
