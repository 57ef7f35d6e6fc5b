//! MQTT bus client adapter.
//!
//! Implements [`BusClient`] on top of the ESP-IDF MQTT client.  The
//! connection event stream is drained on a dedicated receiver thread which
//! tracks the session flag and forwards complete inbound messages into a
//! bounded inbox; the control loop picks them up through
//! [`BusClient::poll_message`] without ever blocking.
//!
//! Each session gets a fresh flag, so a receiver thread winding down
//! after its client was dropped can never clear the next session's state.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//! - **all other targets**: an in-memory broker for host-side tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::info;

use crate::app::ports::BusClient;
use crate::bus::{BusMessage, ConnectOptions};
use crate::error::BusError;

#[cfg(target_os = "espidf")]
use embedded_svc::mqtt::client::{Details, EventPayload, QoS};
#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EspMqttConnection, MqttClientConfiguration};
#[cfg(target_os = "espidf")]
use log::{debug, warn};

/// Inbound messages buffered between two control ticks.
pub const INBOX_DEPTH: usize = 8;

type Inbox = Channel<CriticalSectionRawMutex, BusMessage, INBOX_DEPTH>;

#[cfg(target_os = "espidf")]
const RECEIVER_STACK_SIZE: usize = 12 * 1024;

pub struct MqttBusClient {
    connected: Arc<AtomicBool>,
    inbox: Arc<Inbox>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,

    // ── Simulation broker ──
    #[cfg(not(target_os = "espidf"))]
    sim_session: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_accept: bool,
    #[cfg(not(target_os = "espidf"))]
    pub sim_connects: Vec<ConnectOptions>,
    #[cfg(not(target_os = "espidf"))]
    pub sim_subscriptions: Vec<String>,
    /// `(topic, payload, retain)` in publish order.
    #[cfg(not(target_os = "espidf"))]
    pub sim_published: Vec<(String, String, bool)>,
}

impl Default for MqttBusClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttBusClient {
    pub fn new() -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(false)),
            inbox: Arc::new(Channel::new()),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim_session: false,
            #[cfg(not(target_os = "espidf"))]
            sim_accept: true,
            #[cfg(not(target_os = "espidf"))]
            sim_connects: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_subscriptions: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_published: Vec::new(),
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, options: &ConnectOptions) -> Result<(), BusError> {
        // Drop any previous session before the new client exists.
        self.client = None;

        let (username, password) = match &options.credentials {
            Some((user, pass)) => (Some(user.as_str()), Some(pass.as_str())),
            None => (None, None),
        };
        let conf = MqttClientConfiguration {
            client_id: Some(options.client_id.as_str()),
            username,
            password,
            ..Default::default()
        };
        let (client, connection) =
            EspMqttClient::new(&options.url(), &conf).map_err(|e| {
                warn!("MQTT: client create failed: {}", e);
                BusError::ConnectFailed
            })?;

        spawn_receiver(connection, Arc::clone(&self.connected), Arc::clone(&self.inbox))?;
        self.client = Some(client);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, options: &ConnectOptions) -> Result<(), BusError> {
        self.sim_connects.push(options.clone());
        if !self.sim_accept {
            return Err(BusError::ConnectFailed);
        }
        self.connected.store(self.sim_session, Ordering::Release);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        self.client = None;
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {}

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        let client = self.client.as_mut().ok_or(BusError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| BusError::SubscribeFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        self.sim_subscriptions.push(topic.to_owned());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BusError> {
        let client = self.client.as_mut().ok_or(BusError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, retain, payload.as_bytes())
            .map(|_| ())
            .map_err(|_| BusError::PublishFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BusError> {
        self.sim_published
            .push((topic.to_owned(), payload.to_owned(), retain));
        Ok(())
    }
}

// ── Simulation controls ───────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl MqttBusClient {
    /// Whether the broker acknowledges a session on connect.
    pub fn sim_set_session(&mut self, up: bool) {
        self.sim_session = up;
        self.connected.store(up, Ordering::Release);
    }

    /// Whether connect requests are accepted at all.
    pub fn sim_set_accept(&mut self, accept: bool) {
        self.sim_accept = accept;
    }

    /// Deliver an inbound message as the receiver thread would.
    pub fn sim_inject(&self, topic: &str, payload: &[u8]) -> bool {
        self.inbox
            .try_send(BusMessage {
                topic: topic.to_owned(),
                payload: payload.to_vec(),
            })
            .is_ok()
    }
}

// ───────────────────────────────────────────────────────────────
// BusClient
// ───────────────────────────────────────────────────────────────

impl BusClient for MqttBusClient {
    fn connect(&mut self, options: &ConnectOptions) -> Result<(), BusError> {
        self.connected.store(false, Ordering::Release);
        self.connected = Arc::new(AtomicBool::new(false));
        self.platform_connect(options)?;
        info!("MQTT: session requested at {}", options.url());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.connected.store(false, Ordering::Release);
        // Messages from the old session no longer apply.
        self.inbox.clear();
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }
        self.platform_subscribe(topic)
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }
        self.platform_publish(topic, payload, retain)
    }

    fn poll_message(&mut self) -> Option<BusMessage> {
        self.inbox.try_receive().ok()
    }
}

// ───────────────────────────────────────────────────────────────
// Receiver thread (ESP-IDF)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn spawn_receiver(
    mut connection: EspMqttConnection,
    connected: Arc<AtomicBool>,
    inbox: Arc<Inbox>,
) -> Result<(), BusError> {
    std::thread::Builder::new()
        .name("mqtt-rx".into())
        .stack_size(RECEIVER_STACK_SIZE)
        .spawn(move || {
            // `next` errors once the owning client is dropped.
            while let Ok(event) = connection.next() {
                match event.payload() {
                    EventPayload::Connected(_) => {
                        connected.store(true, Ordering::Release);
                    }
                    EventPayload::Disconnected => {
                        connected.store(false, Ordering::Release);
                    }
                    EventPayload::Received {
                        topic: Some(topic),
                        data,
                        details: Details::Complete,
                        ..
                    } => {
                        let msg = BusMessage {
                            topic: topic.to_owned(),
                            payload: data.to_vec(),
                        };
                        if inbox.try_send(msg).is_err() {
                            debug!("MQTT: inbox full, dropping message on '{}'", topic);
                        }
                    }
                    _ => {}
                }
            }
            connected.store(false, Ordering::Release);
            debug!("MQTT: receiver exited");
        })
        .map(|_| ())
        .map_err(|e| {
            warn!("MQTT: receiver thread spawn failed: {}", e);
            BusError::ConnectFailed
        })
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ConnectOptions {
        ConnectOptions {
            host: "broker.lan".into(),
            port: 1883,
            client_id: "relaynode-EFCAFE-efbeadde".into(),
            credentials: None,
        }
    }

    #[test]
    fn publish_requires_session() {
        let mut c = MqttBusClient::new();
        assert_eq!(c.publish("a/state", "ON", true), Err(BusError::NotConnected));
        c.sim_set_session(true);
        c.connect(&options()).unwrap();
        c.publish("a/state", "ON", true).unwrap();
        assert_eq!(c.sim_published, vec![("a/state".into(), "ON".into(), true)]);
    }

    #[test]
    fn refused_connect_is_an_error() {
        let mut c = MqttBusClient::new();
        c.sim_set_accept(false);
        assert_eq!(c.connect(&options()), Err(BusError::ConnectFailed));
        assert_eq!(c.sim_connects.len(), 1);
    }

    #[test]
    fn disconnect_discards_queued_messages() {
        let mut c = MqttBusClient::new();
        c.sim_set_session(true);
        assert!(c.sim_inject("a/cmd", b"ON"));
        c.disconnect();
        assert!(!c.is_connected());
        assert_eq!(c.poll_message(), None);
    }

    #[test]
    fn stale_session_cannot_clear_new_one() {
        let mut c = MqttBusClient::new();
        c.sim_set_session(true);
        c.connect(&options()).unwrap();
        let previous = Arc::clone(&c.connected);

        c.connect(&options()).unwrap();
        assert!(c.is_connected());
        // The old receiver's final store lands after the new CONNACK.
        previous.store(false, Ordering::Release);
        assert!(c.is_connected());
        c.publish("a/state", "ON", true).unwrap();
    }

    #[test]
    fn inbox_is_bounded() {
        let c = MqttBusClient::new();
        for _ in 0..INBOX_DEPTH {
            assert!(c.sim_inject("a/cmd", b"OFF"));
        }
        assert!(!c.sim_inject("a/cmd", b"OFF"));
    }
}
