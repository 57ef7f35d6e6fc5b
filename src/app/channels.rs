//! Command hand-off from the HTTP task to the control loop.
//!
//! Handlers `try_send`; the control loop drains with `try_receive` at the
//! start of every tick.  A full queue is reported to the caller as busy.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use super::commands::AppCommand;

/// Commands in flight between two ticks.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

pub type CommandQueue = Channel<CriticalSectionRawMutex, AppCommand, COMMAND_QUEUE_DEPTH>;

/// Firmware-wide command queue.
pub static COMMAND_CHANNEL: CommandQueue = Channel::new();

/// Non-blocking enqueue.  Returns `false` when the queue is full.
pub fn submit(queue: &CommandQueue, cmd: AppCommand) -> bool {
    queue.try_send(cmd).is_ok()
}
