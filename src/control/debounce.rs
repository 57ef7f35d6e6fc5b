//! Dry-contact debounce.
//!
//! ## Hardware
//!
//! Dry contact to GND with the internal pull-up enabled: HIGH = open,
//! LOW = closed.  The line is sampled once per control tick.
//!
//! ## Algorithm
//!
//! Edge-filtering debounce.  Every raw transition restarts the settle
//! timer; the stable state only moves once the raw level has held for
//! strictly longer than the interval.

use embedded_hal::digital::PinState;
use serde::Serialize;

/// Settle time a raw level must hold before it is committed.
pub const DEBOUNCE_MS: u32 = 50;

/// Debounced logical state of the dry contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputState {
    Open,
    Closed,
}

impl InputState {
    /// Pull-up wiring: HIGH reads as open.
    pub fn from_level(level: PinState) -> Self {
        match level {
            PinState::High => Self::Open,
            PinState::Low => Self::Closed,
        }
    }

    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

pub struct DebouncedInput {
    last_raw: InputState,
    last_change_ms: u32,
    stable: InputState,
    interval_ms: u32,
}

impl DebouncedInput {
    /// Seed from the first real sample so the first tick never reports a
    /// spurious change.
    pub fn new(first_raw: PinState, now_ms: u32) -> Self {
        Self::with_interval(first_raw, now_ms, DEBOUNCE_MS)
    }

    pub fn with_interval(first_raw: PinState, now_ms: u32, interval_ms: u32) -> Self {
        let state = InputState::from_level(first_raw);
        Self {
            last_raw: state,
            last_change_ms: now_ms,
            stable: state,
            interval_ms,
        }
    }

    /// Feed one raw sample.  Returns the new stable state on the tick it
    /// changes, `None` otherwise.
    pub fn sample(&mut self, raw: PinState, now_ms: u32) -> Option<InputState> {
        let raw = InputState::from_level(raw);
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_change_ms = now_ms;
        }

        let held_ms = now_ms.wrapping_sub(self.last_change_ms);
        if held_ms > self.interval_ms && self.stable != self.last_raw {
            self.stable = self.last_raw;
            return Some(self.stable);
        }
        None
    }

    pub fn stable(&self) -> InputState {
        self.stable
    }
}
