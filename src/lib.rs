//! RelayNode firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod bus;
pub mod config;
pub mod control;
pub mod error;
pub mod network;
pub mod pins;

// The adapters and drivers compile on every target; the hardware-facing
// halves are cfg-gated inside.
pub mod adapters;
pub mod drivers;
