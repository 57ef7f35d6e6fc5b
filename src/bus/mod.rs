//! Message-bus synchronizer.
//!
//! Keeps an MQTT session alive while the device is in connected mode,
//! mirrors relay and input state out as retained messages, and turns
//! command-topic messages into relay intents.  It never writes the relay
//! itself; intents are handed to the service for enforcement.
//!
//! ## Connection state machine
//!
//! ```text
//!   Disconnected ──connect()──▶ Connecting ──ack──▶ Connected ──subscribe──▶ Subscribed
//!        ▲                          │ 10 s                                    │
//!        └──────────────────────────┴──────── link down / session lost ───────┘
//! ```
//!
//! Retries are opportunistic, one attempt per tick.  Session loss is
//! detected lazily, before every use of the client.

pub mod payload;
pub mod topics;

use log::{debug, info, warn};

use crate::app::ports::BusClient;
use crate::config::BusConfig;
use crate::control::{InputState, RelayState};
use crate::error::BusError;

pub use topics::Topics;

/// A connect not acknowledged within this window is torn down.
pub const CONNECT_TIMEOUT_MS: u32 = 10_000;

/// Inbound messages drained per tick.
pub const MAX_MESSAGES_PER_TICK: usize = 8;

// ───────────────────────────────────────────────────────────────
// Wire-side types
// ───────────────────────────────────────────────────────────────

/// Broker session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Present only when a username is configured.
    pub credentials: Option<(String, String)>,
}

impl ConnectOptions {
    pub fn from_config(config: &BusConfig, client_id: &str) -> Self {
        let credentials = if config.user.is_empty() {
            None
        } else {
            Some((config.user.clone(), config.pass.clone()))
        };
        Self {
            host: config.host.clone(),
            port: config.port,
            client_id: client_id.to_owned(),
            credentials,
        }
    }

    pub fn url(&self) -> String {
        format!("mqtt://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Disconnected,
    Connecting { since_ms: u32 },
    Connected,
    Subscribed,
}

impl BusState {
    /// Session is up (subscribed or about to be).
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::Subscribed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting { .. } => "connecting",
            Self::Connected => "connected",
            Self::Subscribed => "subscribed",
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Synchronizer
// ───────────────────────────────────────────────────────────────

pub struct BusSynchronizer {
    config: BusConfig,
    topics: Topics,
    client_id: String,
    state: BusState,
    /// Latest command-topic intent not yet consumed.
    pending: Option<RelayState>,
    connect_timeout_ms: u32,
    /// Consecutive connect failures; the first is logged at warn.
    failures: u32,
}

impl BusSynchronizer {
    pub fn new(config: BusConfig, client_id: String) -> Self {
        let topics = Topics::derive(&config);
        Self {
            config,
            topics,
            client_id,
            state: BusState::Disconnected,
            pending: None,
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
            failures: 0,
        }
    }

    pub fn with_connect_timeout(mut self, timeout_ms: u32) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    // ── Connection upkeep ─────────────────────────────────────

    /// Advance the connection state machine by at most one attempt.
    ///
    /// On reaching `Subscribed` the current relay and input states are
    /// republished retained, changed or not.
    pub fn ensure_connected(
        &mut self,
        client: &mut impl BusClient,
        link_up: bool,
        now_ms: u32,
        relay: RelayState,
        input: InputState,
    ) {
        if !link_up || !self.config.is_ready() {
            if self.state != BusState::Disconnected {
                client.disconnect();
                self.state = BusState::Disconnected;
            }
            return;
        }

        if self.state.is_connected() && !client.is_connected() {
            warn!("bus: session lost");
            self.state = BusState::Disconnected;
        }

        if self.state == BusState::Disconnected {
            let options = ConnectOptions::from_config(&self.config, &self.client_id);
            match client.connect(&options) {
                Ok(()) => {
                    debug!("bus: connecting to {} as {}", options.url(), options.client_id);
                    self.state = BusState::Connecting { since_ms: now_ms };
                }
                Err(e) => {
                    self.note_failure(e);
                    return;
                }
            }
        }

        if let BusState::Connecting { since_ms } = self.state {
            if client.is_connected() {
                info!("bus: connected to {}:{}", self.config.host, self.config.port);
                self.failures = 0;
                self.state = BusState::Connected;
            } else if now_ms.wrapping_sub(since_ms) > self.connect_timeout_ms {
                self.note_failure(BusError::ConnectFailed);
                client.disconnect();
                self.state = BusState::Disconnected;
                return;
            } else {
                return;
            }
        }

        if self.state == BusState::Connected {
            if let Err(e) = client.subscribe(&self.topics.command) {
                warn!("bus: subscribe to '{}' failed: {}", self.topics.command, e);
                client.disconnect();
                self.state = BusState::Disconnected;
                return;
            }
            self.state = BusState::Subscribed;
            info!("bus: subscribed to '{}'", self.topics.command);
            self.publish(client, StateTopic::Relay, payload::relay_payload(relay));
            self.publish(client, StateTopic::Input, payload::input_payload(input));
        }
    }

    fn note_failure(&mut self, e: BusError) {
        if self.failures == 0 {
            warn!("bus: {} ({}:{}), retrying every tick", e, self.config.host, self.config.port);
        } else {
            debug!("bus: {} (attempt {})", e, self.failures + 1);
        }
        self.failures = self.failures.saturating_add(1);
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Queue a relay intent if `msg` is a valid command.  Latest wins.
    pub fn on_message(&mut self, msg: &BusMessage) -> Option<RelayState> {
        if msg.topic != self.topics.command {
            return None;
        }
        let intent = payload::parse_command(&msg.payload);
        match intent {
            Some(state) => {
                debug!("bus: command {:?}", state);
                self.pending = Some(state);
            }
            None => debug!("bus: ignoring payload on '{}'", msg.topic),
        }
        intent
    }

    /// Drain queued client messages into the pending intent.
    pub fn pump(&mut self, client: &mut impl BusClient) {
        if !self.state.is_connected() {
            return;
        }
        for _ in 0..MAX_MESSAGES_PER_TICK {
            let Some(msg) = client.poll_message() else {
                break;
            };
            self.on_message(&msg);
        }
    }

    pub fn take_intent(&mut self) -> Option<RelayState> {
        self.pending.take()
    }

    // ── Outbound ──────────────────────────────────────────────

    pub fn on_relay_changed(&mut self, client: &mut impl BusClient, state: RelayState) {
        self.publish(client, StateTopic::Relay, payload::relay_payload(state));
    }

    pub fn on_input_changed(&mut self, client: &mut impl BusClient, state: InputState) {
        self.publish(client, StateTopic::Input, payload::input_payload(state));
    }

    fn publish(&mut self, client: &mut impl BusClient, which: StateTopic, payload: &str) {
        if self.state != BusState::Subscribed {
            return;
        }
        if !client.is_connected() {
            warn!("bus: session lost");
            self.state = BusState::Disconnected;
            return;
        }
        let topic = match which {
            StateTopic::Relay => &self.topics.state,
            StateTopic::Input => &self.topics.input,
        };
        match client.publish(topic, payload, true) {
            Ok(()) => debug!("bus: {} <- {}", topic, payload),
            Err(e) => warn!("bus: publish to '{}' failed: {}", topic, e),
        }
    }

    // ── Reconfiguration ───────────────────────────────────────

    /// Swap settings, recompute topics and drop the session.  The next
    /// [`ensure_connected`](Self::ensure_connected) reconnects.
    pub fn reconfigure(&mut self, config: BusConfig, client: &mut impl BusClient) {
        self.topics = Topics::derive(&config);
        self.config = config;
        self.pending = None;
        self.failures = 0;
        if self.state != BusState::Disconnected {
            client.disconnect();
            self.state = BusState::Disconnected;
        }
        info!("bus: reconfigured, cmd topic '{}'", self.topics.command);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> BusState {
        self.state
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }
}

#[derive(Clone, Copy)]
enum StateTopic {
    Relay,
    Input,
}
