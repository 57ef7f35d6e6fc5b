//! Network operating mode: the boot-time AP/STA decision and the
//! provisioning surface that runs when the station join fails.

pub mod mode;
pub mod provisioning;

pub use mode::{JoinOutcome, ModeState, NetworkModeController, OperatingMode};
pub use provisioning::{ap_ssid, submit_credentials, ProvisioningError};
