//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules for the RelayNode: input
//! debounce, physical-master relay enforcement and bus synchronisation
//! orchestration.  All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod channels;
pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod status;
