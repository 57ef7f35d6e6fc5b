//! Boot-time operating-mode decision.
//!
//! ```text
//!   Booting ──▶ Connecting ──joined──▶ Connected
//!      │             │
//!      │             └──timeout / error──▶ Provisioning
//!      └──no credentials────────────────▶ Provisioning
//! ```
//!
//! The decision is made once.  Leaving `Connected` or `Provisioning`
//! takes a restart; link loss later on is the bus synchronizer's concern.

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::{ConnectivityPort, TimePort};
use crate::config::WifiCredentials;
use crate::error::LinkError;

/// Bound on the station join at boot.
pub const JOIN_TIMEOUT_MS: u32 = 20_000;

/// Join status poll period.
pub const JOIN_POLL_MS: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Provisioning,
    Connected,
}

impl OperatingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Connected => "connected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    Booting,
    Connecting,
    Connected,
    Provisioning,
}

/// Why the join did or did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined { elapsed_ms: u32 },
    TimedOut,
    Failed(LinkError),
}

pub struct NetworkModeController {
    state: ModeState,
    join_timeout_ms: u32,
    outcome: Option<JoinOutcome>,
}

impl Default for NetworkModeController {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkModeController {
    pub fn new() -> Self {
        Self::with_timeout(JOIN_TIMEOUT_MS)
    }

    pub fn with_timeout(join_timeout_ms: u32) -> Self {
        Self {
            state: ModeState::Booting,
            join_timeout_ms,
            outcome: None,
        }
    }

    /// Decide the operating mode.  Blocks for at most the join timeout.
    ///
    /// Only the first call acts; later calls return the settled mode.
    pub fn boot(
        &mut self,
        credentials: &WifiCredentials,
        link: &mut impl ConnectivityPort,
        clock: &mut impl TimePort,
    ) -> OperatingMode {
        match self.state {
            ModeState::Connected => return OperatingMode::Connected,
            ModeState::Provisioning => return OperatingMode::Provisioning,
            ModeState::Booting | ModeState::Connecting => {}
        }

        if !credentials.is_configured() {
            info!("mode: no stored credentials");
            self.outcome = Some(JoinOutcome::Failed(LinkError::NoCredentials));
            self.state = ModeState::Provisioning;
            return OperatingMode::Provisioning;
        }

        self.state = ModeState::Connecting;
        let outcome = self.join(credentials, link, clock);
        self.outcome = Some(outcome);

        match outcome {
            JoinOutcome::Joined { elapsed_ms } => {
                info!("mode: joined '{}' in {} ms", credentials.ssid, elapsed_ms);
                self.state = ModeState::Connected;
                OperatingMode::Connected
            }
            JoinOutcome::TimedOut => {
                warn!("mode: join timed out after {} ms", self.join_timeout_ms);
                link.leave();
                self.state = ModeState::Provisioning;
                OperatingMode::Provisioning
            }
            JoinOutcome::Failed(e) => {
                warn!("mode: join failed: {}", e);
                link.leave();
                self.state = ModeState::Provisioning;
                OperatingMode::Provisioning
            }
        }
    }

    fn join(
        &self,
        credentials: &WifiCredentials,
        link: &mut impl ConnectivityPort,
        clock: &mut impl TimePort,
    ) -> JoinOutcome {
        if let Err(e) = link.begin_join(credentials) {
            return JoinOutcome::Failed(e);
        }
        let start = clock.now_ms();
        loop {
            let elapsed_ms = clock.now_ms().wrapping_sub(start);
            if link.is_joined() {
                return JoinOutcome::Joined { elapsed_ms };
            }
            if elapsed_ms >= self.join_timeout_ms {
                return JoinOutcome::TimedOut;
            }
            clock.sleep_ms(JOIN_POLL_MS.min(self.join_timeout_ms - elapsed_ms));
        }
    }

    pub fn state(&self) -> ModeState {
        self.state
    }

    pub fn outcome(&self) -> Option<JoinOutcome> {
        self.outcome
    }
}
