//! One-shot GPIO initialization and the raw pin handle.
//!
//! Configures the relay output and the dry-contact input (pull-up) using
//! raw ESP-IDF sys calls.  Called once from `main()` before the control
//! loop starts.  [`Gpio`] exposes a configured pin through the
//! `embedded-hal` digital traits so adapters stay HAL-agnostic.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};
use log::info;

use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

impl From<HwInitError> for crate::error::Error {
    fn from(_: HwInitError) -> Self {
        Self::Init("gpio")
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_gpio_input()?;
        init_gpio_output()?;
    }
    info!(
        "hw_init: relay GPIO{} (active-{}), input GPIO{} (pull-up)",
        pins::RELAY_GPIO,
        if pins::RELAY_ACTIVE_LOW { "low" } else { "high" },
        pins::INPUT_GPIO
    );
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    info!(
        "hw_init(sim): relay GPIO{}, input GPIO{}",
        pins::RELAY_GPIO,
        pins::INPUT_GPIO
    );
    Ok(())
}

// ── GPIO Input ────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_input() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::INPUT_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

// ── GPIO Output ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_output() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::RELAY_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

// ── Pin handle ────────────────────────────────────────────────

/// Raw ESP-IDF error code from a pin operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioError(pub i32);

impl embedded_hal::digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// A pin configured by [`init_peripherals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gpio {
    pin: i32,
}

impl Gpio {
    pub const fn new(pin: i32) -> Self {
        Self { pin }
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }

    #[cfg(target_os = "espidf")]
    fn level(&self) -> bool {
        // SAFETY: reading a configured input has no side effects.
        unsafe { gpio_get_level(self.pin) != 0 }
    }

    #[cfg(target_os = "espidf")]
    fn set_level(&mut self, high: bool) -> Result<(), GpioError> {
        // SAFETY: the pin was configured as an output by init_peripherals().
        let ret = unsafe { gpio_set_level(self.pin, u32::from(high)) };
        if ret != ESP_OK as i32 {
            return Err(GpioError(ret));
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn level(&self) -> bool {
        sim::level(self.pin)
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_level(&mut self, high: bool) -> Result<(), GpioError> {
        sim::set_level(self.pin, high);
        Ok(())
    }
}

impl ErrorType for Gpio {
    type Error = GpioError;
}

impl InputPin for Gpio {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level())
    }
}

impl OutputPin for Gpio {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_level(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_level(true)
    }
}

// ── Simulation backend ───────────────────────────────────────

/// Host-side pin levels.  Every pin idles HIGH, matching a pulled-up
/// input with nothing attached.
#[cfg(not(target_os = "espidf"))]
pub mod sim {
    use core::sync::atomic::{AtomicBool, Ordering};

    const PIN_COUNT: usize = 40;

    static LEVELS: [AtomicBool; PIN_COUNT] = [const { AtomicBool::new(true) }; PIN_COUNT];

    pub fn level(pin: i32) -> bool {
        LEVELS
            .get(pin as usize)
            .is_none_or(|l| l.load(Ordering::Acquire))
    }

    pub fn set_level(pin: i32, high: bool) {
        if let Some(l) = LEVELS.get(pin as usize) {
            l.store(high, Ordering::Release);
        }
    }
}
