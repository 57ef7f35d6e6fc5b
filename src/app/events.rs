//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::bus::BusState;
use crate::control::{InputState, RelayState};

use super::commands::CommandSource;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started; the relay already follows the input.
    Started { relay: RelayState, input: InputState },

    /// The debounced contact changed.
    InputChanged(InputState),

    /// The relay output transitioned.
    RelayChanged { from: RelayState, to: RelayState },

    /// A remote intent agreed with the physical input.
    IntentConfirmed { state: RelayState, source: CommandSource },

    /// A remote intent contradicted the physical input and was dropped.
    IntentOverridden {
        requested: RelayState,
        enforced: RelayState,
        source: CommandSource,
    },

    /// The bus connection moved between states.
    BusStateChanged { from: BusState, to: BusState },

    /// New bus settings were applied.  `persisted` is false if NVS
    /// rejected the write (settings still take effect until restart).
    BusConfigUpdated { persisted: bool },
}
