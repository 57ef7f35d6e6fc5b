//! Mock adapters for integration tests.
//!
//! Record every port call so tests can assert on the full history
//! without touching real GPIO, flash or sockets.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::Ipv4Addr;

use embedded_hal::digital::PinState;
use relaynode::app::events::AppEvent;
use relaynode::app::ports::{
    BusClient, ConfigError, ConfigPort, ConnectivityPort, EventSink, InputPort, RelayOutputPort,
    SystemPort, TimePort,
};
use relaynode::bus::{BusMessage, ConnectOptions};
use relaynode::config::{DeviceConfig, WifiCredentials};
use relaynode::error::{BusError, LinkError};

// ── MockPins ──────────────────────────────────────────────────

/// Dry-contact line plus relay output.  `input` is the raw level the
/// next `read` returns; `writes` is every level driven to the relay.
pub struct MockPins {
    pub input: PinState,
    pub writes: Vec<PinState>,
}

#[allow(dead_code)]
impl MockPins {
    pub fn new(input: PinState) -> Self {
        Self {
            input,
            writes: Vec::new(),
        }
    }

    pub fn close_contact(&mut self) {
        self.input = PinState::Low;
    }

    pub fn open_contact(&mut self) {
        self.input = PinState::High;
    }

    pub fn relay_level(&self) -> Option<PinState> {
        self.writes.last().copied()
    }
}

impl InputPort for MockPins {
    fn read(&mut self) -> PinState {
        self.input
    }
}

impl RelayOutputPort for MockPins {
    fn write(&mut self, level: PinState) {
        self.writes.push(level);
    }
}

// ── MockBus ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBus {
    pub session: bool,
    /// Session comes up as soon as `connect` is called.
    pub ack_on_connect: bool,
    pub refuse: bool,
    pub connects: Vec<ConnectOptions>,
    pub disconnects: u32,
    pub subscriptions: Vec<String>,
    /// `(topic, payload, retain)` in publish order.
    pub published: Vec<(String, String, bool)>,
    pub inbox: VecDeque<BusMessage>,
}

#[allow(dead_code)]
impl MockBus {
    pub fn online() -> Self {
        Self {
            ack_on_connect: true,
            ..Self::default()
        }
    }

    pub fn deliver(&mut self, topic: &str, payload: &str) {
        self.inbox.push_back(BusMessage {
            topic: topic.to_owned(),
            payload: payload.as_bytes().to_vec(),
        });
    }

    pub fn published_to(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, p, _)| p.as_str())
            .collect()
    }

    pub fn drop_session(&mut self) {
        self.session = false;
    }
}

impl BusClient for MockBus {
    fn connect(&mut self, options: &ConnectOptions) -> Result<(), BusError> {
        self.connects.push(options.clone());
        if self.refuse {
            return Err(BusError::ConnectFailed);
        }
        self.session = self.ack_on_connect;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session
    }

    fn disconnect(&mut self) {
        self.session = false;
        self.disconnects += 1;
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        if !self.session {
            return Err(BusError::NotConnected);
        }
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BusError> {
        if !self.session {
            return Err(BusError::NotConnected);
        }
        self.published
            .push((topic.to_owned(), payload.to_owned(), retain));
        Ok(())
    }

    fn poll_message(&mut self) -> Option<BusMessage> {
        self.inbox.pop_front()
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    pub stored: RefCell<Option<DeviceConfig>>,
    pub fail_saves: bool,
    pub saves: RefCell<u32>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn with(config: DeviceConfig) -> Self {
        Self {
            stored: RefCell::new(Some(config)),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn current(&self) -> Option<DeviceConfig> {
        self.stored.borrow().clone()
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        self.stored.borrow().clone().ok_or(ConfigError::NotFound)
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        *self.saves.borrow_mut() += 1;
        if self.fail_saves {
            return Err(ConfigError::IoError);
        }
        *self.stored.borrow_mut() = Some(config.clone());
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockLink ──────────────────────────────────────────────────

/// Station link that comes up once `join_at_ms` has passed on the
/// shared mock clock.  `None` never joins.
pub struct MockLink {
    pub join_at_ms: Option<u32>,
    pub clock_ms: std::rc::Rc<std::cell::Cell<u32>>,
    pub hostname: Option<String>,
    pub join_requests: u32,
    pub leaves: u32,
    pub ap_ssid: Option<String>,
    joining: bool,
}

#[allow(dead_code)]
impl MockLink {
    pub fn new(join_at_ms: Option<u32>, clock: &MockClock) -> Self {
        Self {
            join_at_ms,
            clock_ms: clock.now.clone(),
            hostname: None,
            join_requests: 0,
            leaves: 0,
            ap_ssid: None,
            joining: false,
        }
    }
}

impl ConnectivityPort for MockLink {
    fn set_hostname(&mut self, hostname: &str) -> Result<(), LinkError> {
        self.hostname = Some(hostname.to_owned());
        Ok(())
    }

    fn begin_join(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        if !credentials.is_configured() {
            return Err(LinkError::NoCredentials);
        }
        self.join_requests += 1;
        self.joining = true;
        Ok(())
    }

    fn is_joined(&mut self) -> bool {
        self.joining && self.join_at_ms.is_some_and(|t| self.clock_ms.get() >= t)
    }

    fn leave(&mut self) {
        self.joining = false;
        self.leaves += 1;
    }

    fn start_access_point(&mut self, ssid: &str) -> Result<(), LinkError> {
        self.ap_ssid = Some(ssid.to_owned());
        Ok(())
    }

    fn ip_address(&self) -> Option<Ipv4Addr> {
        if self.ap_ssid.is_some() {
            Some(Ipv4Addr::new(192, 168, 71, 1))
        } else if self.joining {
            Some(Ipv4Addr::new(192, 168, 1, 50))
        } else {
            None
        }
    }
}

// ── MockClock ─────────────────────────────────────────────────

/// Virtual clock: `sleep_ms` advances time instantly.
#[derive(Default)]
pub struct MockClock {
    pub now: std::rc::Rc<std::cell::Cell<u32>>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn at(ms: u32) -> Self {
        let c = Self::default();
        c.now.set(ms);
        c
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl TimePort for MockClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.advance(ms);
    }
}

// ── MockSystem ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSystem {
    pub restarts: Vec<u32>,
}

impl SystemPort for MockSystem {
    fn schedule_restart(&mut self, delay_ms: u32) {
        self.restarts.push(delay_ms);
    }
}
