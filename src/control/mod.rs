//! Relay control: contact debounce and the physical-master relay rule.

pub mod debounce;
pub mod relay;

pub use debounce::{DebouncedInput, InputState, DEBOUNCE_MS};
pub use relay::{desired_from, IntentOutcome, Polarity, RelayController, RelayState};
