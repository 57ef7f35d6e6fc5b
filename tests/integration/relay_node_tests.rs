//! End-to-end control loop tests: input debounce, physical master
//! enforcement and intent handling through `AppService`.

use embedded_hal::digital::PinState;
use relaynode::app::commands::{AppCommand, CommandSource, RelayIntent};
use relaynode::app::events::AppEvent;
use relaynode::app::service::AppService;
use relaynode::config::DeviceConfig;
use relaynode::control::{InputState, Polarity, RelayState};

use crate::mock_hw::{MockBus, MockNvs, MockPins, RecordingSink};

const TICK: u32 = 10;

struct Rig {
    app: AppService,
    pins: MockPins,
    bus: MockBus,
    sink: RecordingSink,
    now: u32,
}

impl Rig {
    fn new(input: PinState, polarity: Polarity) -> Self {
        let mut pins = MockPins::new(input);
        let mut sink = RecordingSink::default();
        let mut app = AppService::new(
            DeviceConfig::default(),
            polarity,
            "relaynode-EFCAFE-efbeadde".into(),
            input,
            0,
        );
        app.start(&mut pins, &mut sink);
        Self {
            app,
            pins,
            bus: MockBus::default(),
            sink,
            now: 0,
        }
    }

    fn run_for(&mut self, ms: u32) {
        let end = self.now + ms;
        while self.now < end {
            self.now += TICK;
            self.app
                .tick(self.now, &mut self.pins, &mut self.bus, false, &mut self.sink);
        }
    }

    fn request(&mut self, state: RelayState) {
        let store = MockNvs::default();
        self.app.handle_command(
            AppCommand::SetRelay(RelayIntent {
                state,
                source: CommandSource::Http,
            }),
            &store,
            &mut self.bus,
            &mut self.sink,
        );
    }
}

#[test]
fn boot_drives_relay_from_input() {
    let rig = Rig::new(PinState::Low, Polarity::ActiveHigh);
    assert_eq!(rig.app.relay(), RelayState::On);
    assert_eq!(rig.pins.writes, vec![PinState::High], "one unconditional boot write");

    let rig = Rig::new(PinState::High, Polarity::ActiveHigh);
    assert_eq!(rig.app.relay(), RelayState::Off);
    assert_eq!(rig.pins.writes, vec![PinState::Low]);
}

#[test]
fn active_low_board_inverts_levels() {
    let mut rig = Rig::new(PinState::High, Polarity::ActiveLow);
    assert_eq!(rig.pins.relay_level(), Some(PinState::High), "off on active-low is HIGH");
    rig.pins.close_contact();
    rig.run_for(100);
    assert_eq!(rig.app.relay(), RelayState::On);
    assert_eq!(rig.pins.relay_level(), Some(PinState::Low));
}

#[test]
fn contact_close_switches_relay_after_debounce() {
    let mut rig = Rig::new(PinState::High, Polarity::ActiveHigh);
    rig.pins.close_contact();
    rig.run_for(50);
    assert_eq!(rig.app.relay(), RelayState::Off, "still settling");
    rig.run_for(20);
    assert_eq!(rig.app.input(), InputState::Closed);
    assert_eq!(rig.app.relay(), RelayState::On);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::RelayChanged { to: RelayState::On, .. })),
        1
    );
    assert_eq!(rig.pins.writes, vec![PinState::Low, PinState::High]);
}

#[test]
fn chatter_never_reaches_relay() {
    let mut rig = Rig::new(PinState::High, Polarity::ActiveHigh);
    for i in 0..30 {
        if i % 2 == 0 {
            rig.pins.close_contact();
        } else {
            rig.pins.open_contact();
        }
        rig.run_for(TICK * 2);
    }
    assert_eq!(rig.app.relay(), RelayState::Off);
    assert_eq!(rig.pins.writes.len(), 1, "only the boot write");
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::InputChanged(_))), 0);
}

#[test]
fn contradicting_intent_is_overridden_without_glitch() {
    let mut rig = Rig::new(PinState::High, Polarity::ActiveHigh);
    rig.run_for(100);
    rig.request(RelayState::On);
    rig.run_for(TICK);

    assert_eq!(rig.app.relay(), RelayState::Off);
    assert_eq!(rig.pins.writes, vec![PinState::Low], "pin never pulsed");
    assert!(rig.sink.events.contains(&AppEvent::IntentOverridden {
        requested: RelayState::On,
        enforced: RelayState::Off,
        source: CommandSource::Http,
    }));
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::RelayChanged { .. })), 0);
}

#[test]
fn agreeing_intent_is_confirmed() {
    let mut rig = Rig::new(PinState::Low, Polarity::ActiveHigh);
    rig.request(RelayState::On);
    rig.run_for(TICK);
    assert!(rig.sink.events.contains(&AppEvent::IntentConfirmed {
        state: RelayState::On,
        source: CommandSource::Http,
    }));
    assert_eq!(rig.pins.writes.len(), 1, "no redundant write");
}

#[test]
fn relay_tracks_input_across_many_transitions() {
    let mut rig = Rig::new(PinState::High, Polarity::ActiveHigh);
    for round in 0..5 {
        rig.pins.close_contact();
        rig.run_for(100);
        assert_eq!(rig.app.relay(), RelayState::On, "round {round}");
        rig.request(RelayState::Off);
        rig.pins.open_contact();
        rig.run_for(100);
        assert_eq!(rig.app.relay(), RelayState::Off, "round {round}");
    }
    assert_eq!(rig.pins.writes.len(), 11);
}
