//! Message-bus synchronizer tests driven through `AppService::tick`.

use embedded_hal::digital::PinState;
use relaynode::app::commands::{AppCommand, BusConfigUpdate};
use relaynode::app::events::AppEvent;
use relaynode::app::service::AppService;
use relaynode::bus::{BusState, BusSynchronizer};
use relaynode::config::{BusConfig, DeviceConfig};
use relaynode::control::{Polarity, RelayState};

use crate::mock_hw::{MockBus, MockNvs, MockPins, RecordingSink};

const TICK: u32 = 10;
const CMD: &str = "home/relay1/cmd";
const STATE: &str = "home/relay1/state";
const DIN: &str = "home/relay1/din";

fn bus_config() -> BusConfig {
    BusConfig {
        enabled: true,
        host: "broker.lan".into(),
        cmd_topic: CMD.into(),
        ..BusConfig::default()
    }
}

struct Rig {
    app: AppService,
    pins: MockPins,
    bus: MockBus,
    sink: RecordingSink,
    link_up: bool,
    now: u32,
}

impl Rig {
    fn new(input: PinState, bus: MockBus) -> Self {
        let config = DeviceConfig {
            bus: bus_config(),
            ..DeviceConfig::default()
        };
        let mut pins = MockPins::new(input);
        let mut sink = RecordingSink::default();
        let mut app = AppService::new(
            config,
            Polarity::ActiveHigh,
            "relaynode-EFCAFE-efbeadde".into(),
            input,
            0,
        );
        app.start(&mut pins, &mut sink);
        Self {
            app,
            pins,
            bus,
            sink,
            link_up: true,
            now: 0,
        }
    }

    fn run_for(&mut self, ms: u32) {
        let end = self.now + ms;
        while self.now < end {
            self.now += TICK;
            self.app.tick(
                self.now,
                &mut self.pins,
                &mut self.bus,
                self.link_up,
                &mut self.sink,
            );
        }
    }
}

#[test]
fn subscribe_then_publish_retained_snapshot() {
    let mut rig = Rig::new(PinState::Low, MockBus::online());
    rig.run_for(TICK);

    assert_eq!(rig.app.bus_state(), BusState::Subscribed);
    assert_eq!(rig.bus.subscriptions, vec![CMD.to_owned()]);
    assert_eq!(
        rig.bus.published,
        vec![
            (STATE.to_owned(), "ON".to_owned(), true),
            (DIN.to_owned(), "ON".to_owned(), true),
        ]
    );
    let opts = &rig.bus.connects[0];
    assert_eq!(opts.client_id, "relaynode-EFCAFE-efbeadde");
    assert_eq!(opts.port, 1883);
    assert_eq!(opts.credentials, None, "no user, no credentials");
}

#[test]
fn credentials_sent_only_with_username() {
    let mut rig = Rig::new(PinState::High, MockBus::online());
    let store = MockNvs::default();
    rig.app.handle_command(
        AppCommand::UpdateBusConfig(BusConfigUpdate {
            enabled: true,
            host: "broker.lan".into(),
            port: Some(8883),
            user: "relay".into(),
            pass: Some("s3cret".into()),
            cmd_topic: CMD.into(),
            state_topic: String::new(),
        }),
        &store,
        &mut rig.bus,
        &mut rig.sink,
    );
    rig.run_for(TICK);
    let opts = rig.bus.connects.last().unwrap();
    assert_eq!(opts.port, 8883);
    assert_eq!(opts.credentials, Some(("relay".into(), "s3cret".into())));
}

#[test]
fn input_change_publishes_state_and_din() {
    let mut rig = Rig::new(PinState::High, MockBus::online());
    rig.run_for(TICK);
    rig.bus.published.clear();

    rig.pins.close_contact();
    rig.run_for(100);

    assert_eq!(rig.bus.published_to(STATE), vec!["ON"]);
    assert_eq!(rig.bus.published_to(DIN), vec!["ON"]);
    assert!(rig.bus.published.iter().all(|(_, _, retain)| *retain));
}

#[test]
fn bus_command_confirmed_or_overridden() {
    let mut rig = Rig::new(PinState::Low, MockBus::online());
    rig.run_for(TICK);
    rig.bus.published.clear();

    rig.bus.deliver(CMD, " off ");
    rig.run_for(TICK * 2);
    assert_eq!(rig.app.relay(), RelayState::On, "closed contact is master");
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::IntentOverridden { requested: RelayState::Off, .. })),
        1
    );
    assert!(rig.bus.published.is_empty(), "nothing changed, nothing published");

    rig.bus.deliver(CMD, "1");
    rig.run_for(TICK * 2);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::IntentConfirmed { state: RelayState::On, .. })),
        1
    );
}

#[test]
fn held_contact_beats_remote_off_sent_every_tick() {
    let mut rig = Rig::new(PinState::High, MockBus::online());
    rig.run_for(TICK);
    assert_eq!(rig.app.relay(), RelayState::Off);
    rig.bus.published.clear();

    rig.pins.close_contact();
    for _ in 0..10 {
        rig.bus.deliver(CMD, "OFF");
        rig.run_for(TICK);
    }

    assert_eq!(rig.app.relay(), RelayState::On);
    assert_eq!(rig.pins.relay_level(), Some(PinState::High));
    assert_eq!(rig.bus.published_to(STATE), vec!["ON"]);
    assert_eq!(rig.bus.published_to(DIN), vec!["ON"]);
    assert!(rig.bus.published.iter().all(|(_, _, retain)| *retain));
    assert!(
        rig.sink
            .count(|e| matches!(e, AppEvent::IntentOverridden { requested: RelayState::Off, .. }))
            >= 3,
        "commands after the debounce settles are overridden"
    );
}

#[test]
fn garbage_and_foreign_topics_are_ignored() {
    let mut rig = Rig::new(PinState::High, MockBus::online());
    rig.run_for(TICK);
    rig.bus.deliver(CMD, "toggle");
    rig.bus.deliver("home/relay2/cmd", "ON");
    rig.run_for(TICK * 3);
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::IntentConfirmed { .. } | AppEvent::IntentOverridden { .. }
        )),
        0
    );
}

#[test]
fn no_traffic_while_disabled_or_link_down() {
    let mut rig = Rig::new(PinState::High, MockBus::online());
    rig.link_up = false;
    rig.run_for(200);
    assert!(rig.bus.connects.is_empty());
    assert_eq!(rig.app.bus_state(), BusState::Disconnected);

    rig.link_up = true;
    rig.run_for(TICK);
    assert_eq!(rig.app.bus_state(), BusState::Subscribed);

    rig.link_up = false;
    rig.run_for(TICK);
    assert_eq!(rig.app.bus_state(), BusState::Disconnected);
    assert_eq!(rig.bus.disconnects, 1);
}

#[test]
fn broker_outage_never_affects_relay() {
    let mut bus = MockBus::online();
    bus.refuse = true;
    let mut rig = Rig::new(PinState::High, bus);
    rig.pins.close_contact();
    rig.run_for(200);
    assert_eq!(rig.app.relay(), RelayState::On);
    assert!(rig.bus.connects.len() > 1, "retries every tick");
    assert!(rig.bus.published.is_empty());
}

#[test]
fn lost_session_resubscribes_and_republishes() {
    let mut rig = Rig::new(PinState::Low, MockBus::online());
    rig.run_for(TICK);
    rig.bus.drop_session();
    rig.run_for(TICK * 2);

    assert_eq!(rig.app.bus_state(), BusState::Subscribed);
    assert_eq!(rig.bus.subscriptions.len(), 2);
    assert_eq!(rig.bus.published_to(STATE), vec!["ON", "ON"]);
}

#[test]
fn unacknowledged_connect_times_out() {
    let config = DeviceConfig {
        bus: bus_config(),
        ..DeviceConfig::default()
    };
    let mut rig = Rig::new(PinState::High, MockBus::default());
    rig.app = AppService::new(
        config.clone(),
        Polarity::ActiveHigh,
        "id".into(),
        PinState::High,
        0,
    )
    .with_bus(BusSynchronizer::new(config.bus, "id".into()).with_connect_timeout(100));

    rig.run_for(TICK);
    assert!(matches!(rig.app.bus_state(), BusState::Connecting { .. }));
    rig.run_for(150);
    assert!(rig.bus.connects.len() >= 2, "torn down and retried");
    assert!(rig.bus.disconnects >= 1);
}

#[test]
fn reconfigure_persists_and_moves_topics() {
    let mut rig = Rig::new(PinState::High, MockBus::online());
    rig.run_for(TICK);
    let store = MockNvs::default();

    rig.app.handle_command(
        AppCommand::UpdateBusConfig(BusConfigUpdate {
            enabled: true,
            host: "broker.lan".into(),
            port: None,
            user: String::new(),
            pass: None,
            cmd_topic: "garage/door".into(),
            state_topic: "garage/door/status".into(),
        }),
        &store,
        &mut rig.bus,
        &mut rig.sink,
    );
    assert_eq!(rig.app.bus_state(), BusState::Disconnected);
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::BusConfigUpdated { persisted: true }));
    assert_eq!(store.current().unwrap().bus.cmd_topic, "garage/door");

    rig.run_for(TICK);
    assert_eq!(rig.bus.subscriptions.last().map(String::as_str), Some("garage/door"));
    assert_eq!(rig.bus.published_to("garage/door/status"), vec!["OFF"]);
    assert_eq!(rig.bus.published_to("garage/door/din"), vec!["OFF"]);
}

#[test]
fn failed_persist_still_applies_settings() {
    let mut rig = Rig::new(PinState::High, MockBus::online());
    let store = MockNvs::failing();
    rig.app.handle_command(
        AppCommand::UpdateBusConfig(BusConfigUpdate {
            enabled: false,
            host: "broker.lan".into(),
            port: None,
            user: String::new(),
            pass: None,
            cmd_topic: CMD.into(),
            state_topic: String::new(),
        }),
        &store,
        &mut rig.bus,
        &mut rig.sink,
    );
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::BusConfigUpdated { persisted: false }));
    assert!(!rig.app.config().bus.enabled);
    rig.run_for(100);
    assert!(rig.bus.connects.is_empty());
}
