//! Device restart adapter.
//!
//! Implements [`SystemPort`].  The restart runs on a short-lived thread
//! so the HTTP handler that requested it can still send its response.

use log::info;

use crate::app::ports::SystemPort;

#[derive(Default)]
pub struct EspSystem {
    /// Simulation: last requested restart delay.
    #[cfg(not(target_os = "espidf"))]
    pub restart_requested: Option<u32>,
}

impl EspSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SystemPort for EspSystem {
    #[cfg(target_os = "espidf")]
    fn schedule_restart(&mut self, delay_ms: u32) {
        info!("system: restarting in {} ms", delay_ms);
        let spawned = std::thread::Builder::new()
            .name("restart".into())
            .stack_size(2048)
            .spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(u64::from(delay_ms)));
                // SAFETY: esp_restart never returns; nothing is left to unwind.
                unsafe { esp_idf_svc::sys::esp_restart() };
            });
        if spawned.is_err() {
            // No thread to defer on: restart in place.
            unsafe { esp_idf_svc::sys::esp_restart() };
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn schedule_restart(&mut self, delay_ms: u32) {
        info!("system(sim): restart requested in {} ms", delay_ms);
        self.restart_requested = Some(delay_ms);
    }
}
