//! Relay output controller.
//!
//! Owns the relay state and the single rule for deriving it from the
//! debounced contact: closed -> on, open -> off.  Remote intents never
//! drive the pin directly; they are judged against that rule and either
//! confirmed or overridden.
//!
//! ## Hardware
//!
//! Single GPIO to the relay driver transistor.  Polarity is fixed at build
//! time (see [`crate::pins::RELAY_ACTIVE_LOW`]).

use embedded_hal::digital::PinState;
use log::debug;

use super::debounce::InputState;
use crate::app::ports::RelayOutputPort;

/// Upper bound on intents resolved in a single tick.
pub const MAX_PENDING_INTENTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Off,
    On,
}

impl RelayState {
    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// Drive polarity of the relay stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    pub const fn from_active_low(active_low: bool) -> Self {
        if active_low { Self::ActiveLow } else { Self::ActiveHigh }
    }

    /// Pin level that produces `state`.
    pub fn level_for(self, state: RelayState) -> PinState {
        match (self, state) {
            (Self::ActiveHigh, RelayState::On) | (Self::ActiveLow, RelayState::Off) => {
                PinState::High
            }
            (Self::ActiveHigh, RelayState::Off) | (Self::ActiveLow, RelayState::On) => {
                PinState::Low
            }
        }
    }
}

/// Physical master: the stable input alone decides the relay.
pub fn desired_from(input: InputState) -> RelayState {
    match input {
        InputState::Closed => RelayState::On,
        InputState::Open => RelayState::Off,
    }
}

/// How a remote intent fared against the physical input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    /// The intent matched the input and stands.
    Confirmed,
    /// The intent contradicted the input and was discarded.
    Overridden,
}

pub fn judge(intent: RelayState, stable: InputState) -> IntentOutcome {
    if intent == desired_from(stable) {
        IntentOutcome::Confirmed
    } else {
        IntentOutcome::Overridden
    }
}

/// Result of one enforcement pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub previous: RelayState,
    pub current: RelayState,
    /// Index-aligned with the intents passed in (truncated at
    /// [`MAX_PENDING_INTENTS`]).
    pub outcomes: heapless::Vec<IntentOutcome, MAX_PENDING_INTENTS>,
}

impl Reconciliation {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct RelayController {
    state: RelayState,
    polarity: Polarity,
}

impl RelayController {
    pub fn new(polarity: Polarity) -> Self {
        Self {
            state: RelayState::Off,
            polarity,
        }
    }

    /// Boot-time write.  Always touches the pin so the hardware matches
    /// the cached state regardless of its reset level.
    pub fn start(&mut self, state: RelayState, out: &mut impl RelayOutputPort) {
        self.state = state;
        out.write(self.polarity.level_for(state));
    }

    /// Set the relay, writing the pin only on a transition.  Returns the
    /// previous state for change detection.
    pub fn apply(&mut self, state: RelayState, out: &mut impl RelayOutputPort) -> RelayState {
        let previous = self.state;
        if state != previous {
            out.write(self.polarity.level_for(state));
            self.state = state;
            debug!("relay: {:?} -> {:?}", previous, state);
        }
        previous
    }

    /// Resolve this tick's intents, then enforce the input-derived state.
    ///
    /// Intents are judged before the pin is touched, so a contradicting
    /// intent never reaches the output even for one tick.
    pub fn reconcile(
        &mut self,
        intents: &[RelayState],
        stable: InputState,
        out: &mut impl RelayOutputPort,
    ) -> Reconciliation {
        let mut outcomes = heapless::Vec::new();
        for &intent in intents.iter().take(MAX_PENDING_INTENTS) {
            let _ = outcomes.push(judge(intent, stable));
        }
        let current = desired_from(stable);
        let previous = self.apply(current, out);
        Reconciliation {
            previous,
            current,
            outcomes,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }
}
