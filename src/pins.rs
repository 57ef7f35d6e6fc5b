//! GPIO pin assignments for the RelayNode board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Relay output
// ---------------------------------------------------------------------------

/// Digital output driving the relay coil transistor.
pub const RELAY_GPIO: i32 = 16;

/// Relay driver polarity.  `false` = energised on HIGH.
/// Fixed at build time; flip for boards with an inverting driver stage.
pub const RELAY_ACTIVE_LOW: bool = false;

// ---------------------------------------------------------------------------
// Dry-contact input
// ---------------------------------------------------------------------------

/// Digital input with internal pull-up.  Dry contact switches to GND:
/// HIGH = open, LOW = closed.
pub const INPUT_GPIO: i32 = 25;
