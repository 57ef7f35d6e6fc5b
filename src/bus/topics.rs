//! Topic derivation.
//!
//! The command topic is user-supplied.  Sibling topics hang off its base:
//! the command topic with a trailing `/cmd` level removed, or the whole
//! command topic when it has no such level.  The state topic defaults to
//! `<base>/state` unless set explicitly; the input topic is always
//! `<base>/din` and cannot be overridden.

use crate::config::BusConfig;

pub const COMMAND_LEVEL: &str = "/cmd";
pub const STATE_SUFFIX: &str = "/state";
pub const INPUT_SUFFIX: &str = "/din";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topics {
    pub command: String,
    pub state: String,
    pub input: String,
}

impl Topics {
    pub fn derive(config: &BusConfig) -> Self {
        let command = config.cmd_topic.clone();
        let base = base_of(&command);
        let state = if config.state_topic.is_empty() {
            format!("{base}{STATE_SUFFIX}")
        } else {
            config.state_topic.clone()
        };
        let input = format!("{base}{INPUT_SUFFIX}");
        Self {
            command,
            state,
            input,
        }
    }
}

fn base_of(command: &str) -> &str {
    match command.strip_suffix(COMMAND_LEVEL) {
        Some(base) if !base.is_empty() => base,
        _ => command,
    }
}
