//! Application service, the hexagonal core.
//!
//! [`AppService`] owns the debounced input, the relay controller, the bus
//! synchronizer and the cached configuration.  It exposes a clean,
//! hardware-agnostic API.  All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!    InputPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                  │        AppService         │
//! RelayOutput ◀──  │ Debounce · Relay · Bus    │ ◀─▶ BusClient
//!                  └──────────────────────────┘
//! ```
//!
//! ## Tick order
//!
//! 1. sample input (publish on change)
//! 2. collect command intents (HTTP queue, bus)
//! 3. enforce relay = desired_from(input), judging each intent
//! 4. service bus I/O (connect upkeep, drain inbound)

use log::{info, warn};

use crate::bus::{BusState, BusSynchronizer};
use crate::config::DeviceConfig;
use crate::control::relay::MAX_PENDING_INTENTS;
use crate::control::{
    desired_from, DebouncedInput, InputState, IntentOutcome, Polarity, RelayController,
    RelayState,
};
use embedded_hal::digital::PinState;

use super::commands::{AppCommand, CommandSource, RelayIntent};
use super::events::AppEvent;
use super::ports::{BusClient, ConfigPort, EventSink, InputPort, RelayOutputPort};
use super::status::{BusConfigView, StatusSnapshot};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    input: DebouncedInput,
    relay: RelayController,
    bus: BusSynchronizer,
    config: DeviceConfig,
    /// HTTP intents received since the last tick.
    pending: heapless::Vec<RelayIntent, MAX_PENDING_INTENTS>,
}

impl AppService {
    /// Construct the service from configuration and the first raw sample.
    ///
    /// Does **not** touch the relay; call [`start`](Self::start) next.
    pub fn new(
        config: DeviceConfig,
        polarity: Polarity,
        client_id: String,
        first_raw: PinState,
        now_ms: u32,
    ) -> Self {
        let bus = BusSynchronizer::new(config.bus.clone(), client_id);
        Self {
            input: DebouncedInput::new(first_raw, now_ms),
            relay: RelayController::new(polarity),
            bus,
            config,
            pending: heapless::Vec::new(),
        }
    }

    /// Swap the bus synchronizer (e.g. to shorten the connect timeout).
    pub fn with_bus(mut self, bus: BusSynchronizer) -> Self {
        self.bus = bus;
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive the relay to follow the input before any networking starts.
    pub fn start(&mut self, out: &mut impl RelayOutputPort, sink: &mut impl EventSink) {
        let input = self.input.stable();
        let relay = desired_from(input);
        self.relay.start(relay, out);
        sink.emit(&AppEvent::Started { relay, input });
        info!("AppService started: input {:?}, relay {:?}", input, relay);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`InputPort`] and
    /// [`RelayOutputPort`]; this avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u32,
        hw: &mut (impl InputPort + RelayOutputPort),
        client: &mut impl BusClient,
        link_up: bool,
        sink: &mut impl EventSink,
    ) {
        let bus_before = self.bus.state();

        // 1. Sample input
        let raw = hw.read();
        if let Some(stable) = self.input.sample(raw, now_ms) {
            sink.emit(&AppEvent::InputChanged(stable));
            self.bus.on_input_changed(client, stable);
        }
        let stable = self.input.stable();

        // 2. Collect intents: HTTP first, then the latest bus command
        if let Some(state) = self.bus.take_intent() {
            self.queue_intent(RelayIntent {
                state,
                source: CommandSource::Bus,
            });
        }
        let intents = core::mem::take(&mut self.pending);
        let states: heapless::Vec<RelayState, MAX_PENDING_INTENTS> =
            intents.iter().map(|i| i.state).collect();

        // 3. Enforce physical master
        let rec = self.relay.reconcile(&states, stable, hw);
        for (intent, outcome) in intents.iter().zip(rec.outcomes.iter()) {
            let event = match outcome {
                IntentOutcome::Confirmed => AppEvent::IntentConfirmed {
                    state: intent.state,
                    source: intent.source,
                },
                IntentOutcome::Overridden => AppEvent::IntentOverridden {
                    requested: intent.state,
                    enforced: rec.current,
                    source: intent.source,
                },
            };
            sink.emit(&event);
        }
        if rec.changed() {
            sink.emit(&AppEvent::RelayChanged {
                from: rec.previous,
                to: rec.current,
            });
            self.bus.on_relay_changed(client, rec.current);
        }

        // 4. Bus I/O
        self.bus
            .ensure_connected(client, link_up, now_ms, self.relay.state(), stable);
        self.bus.pump(client);

        let bus_after = self.bus.state();
        if bus_after != bus_before {
            sink.emit(&AppEvent::BusStateChanged {
                from: bus_before,
                to: bus_after,
            });
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.  Relay intents wait for the next
    /// tick; bus reconfiguration is persisted and applied immediately.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        store: &impl ConfigPort,
        client: &mut impl BusClient,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::SetRelay(intent) => self.queue_intent(intent),
            AppCommand::UpdateBusConfig(update) => {
                let bus = update.apply_to(&self.config.bus);
                let mut next = self.config.clone();
                next.bus = bus.clone();
                let persisted = match store.save(&next) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("bus config save failed: {}", e);
                        false
                    }
                };
                self.config = next;
                let before = self.bus.state();
                self.bus.reconfigure(bus, client);
                sink.emit(&AppEvent::BusConfigUpdated { persisted });
                if self.bus.state() != before {
                    sink.emit(&AppEvent::BusStateChanged {
                        from: before,
                        to: self.bus.state(),
                    });
                }
            }
        }
    }

    fn queue_intent(&mut self, intent: RelayIntent) {
        if self.pending.push(intent).is_err() {
            warn!("relay intent dropped, {} already pending", MAX_PENDING_INTENTS);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn relay(&self) -> RelayState {
        self.relay.state()
    }

    pub fn input(&self) -> InputState {
        self.input.stable()
    }

    pub fn bus_state(&self) -> BusState {
        self.bus.state()
    }

    pub fn bus(&self) -> &BusSynchronizer {
        &self.bus
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Refresh the core-owned fields of a published snapshot.
    pub fn fill_snapshot(&self, snapshot: &mut StatusSnapshot) {
        snapshot.relay = self.relay.state();
        snapshot.input = self.input.stable();
        snapshot.bus_state = self.bus.state();
        snapshot.bus = BusConfigView::from(&self.config.bus);
    }
}
