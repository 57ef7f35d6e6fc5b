//! Hardware adapter: bridges the relay and contact pins to domain ports.
//!
//! Generic over `embedded-hal` digital pins so the same adapter runs on
//! the ESP-IDF [`Gpio`](crate::drivers::hw_init::Gpio) handle and on
//! host-side fakes.  This is the only module in the system that touches
//! actual hardware.

use embedded_hal::digital::{InputPin, OutputPin, PinState};
use log::warn;

use crate::app::ports::{InputPort, RelayOutputPort};

/// Concrete adapter that combines both pins behind port traits.
pub struct HardwareAdapter<I, O> {
    input: I,
    relay: O,
    read_errors: u32,
}

impl<I: InputPin, O: OutputPin> HardwareAdapter<I, O> {
    pub fn new(input: I, relay: O) -> Self {
        Self {
            input,
            relay,
            read_errors: 0,
        }
    }

    /// Failed input reads since boot.
    pub fn read_errors(&self) -> u32 {
        self.read_errors
    }
}

// ── InputPort implementation ──────────────────────────────────

impl<I: InputPin, O: OutputPin> InputPort for HardwareAdapter<I, O> {
    /// A failed read reports HIGH (contact open), the pull-up idle level.
    fn read(&mut self) -> PinState {
        match self.input.is_high() {
            Ok(high) => PinState::from(high),
            Err(e) => {
                if self.read_errors == 0 {
                    warn!("input read failed: {:?}", e);
                }
                self.read_errors = self.read_errors.saturating_add(1);
                PinState::High
            }
        }
    }
}

// ── RelayOutputPort implementation ────────────────────────────

impl<I: InputPin, O: OutputPin> RelayOutputPort for HardwareAdapter<I, O> {
    fn write(&mut self, level: PinState) {
        if let Err(e) = self.relay.set_state(level) {
            warn!("relay write failed: {:?}", e);
        }
    }
}
