//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART in production), one tagged line
//! per event.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { relay, input } => {
                info!("START | input={:?} relay={:?}", input, relay);
            }
            AppEvent::InputChanged(state) => {
                info!("INPUT | {:?}", state);
            }
            AppEvent::RelayChanged { from, to } => {
                info!("RELAY | {:?} -> {:?}", from, to);
            }
            AppEvent::IntentConfirmed { state, source } => {
                info!("RELAY | {:?} intent {:?} confirmed", source, state);
            }
            AppEvent::IntentOverridden {
                requested,
                enforced,
                source,
            } => {
                warn!(
                    "RELAY | {:?} intent {:?} overridden by input, relay stays {:?}",
                    source, requested, enforced
                );
            }
            AppEvent::BusStateChanged { from, to } => {
                info!("BUS   | {} -> {}", from.as_str(), to.as_str());
            }
            AppEvent::BusConfigUpdated { persisted } => {
                info!("BUS   | config updated (persisted={})", persisted);
            }
        }
    }
}
