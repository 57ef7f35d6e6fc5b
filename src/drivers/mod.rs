//! GPIO bring-up, pin wrappers and the task watchdog.

pub mod hw_init;
pub mod watchdog;
