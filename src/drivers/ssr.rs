//! Solid-state relay driver (channels 1–3).
//!
//! An SSR is a digital switch: the 0–100 power contract is mapped to a
//! bang-bang output, HIGH iff power > 50.  This is a deliberate
//! simplification rather than true duty-cycling — time-proportioned
//! switching over a mains-cycle window would smooth heat delivery and can
//! replace [`power_to_level`] without touching the input contract.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the real enable GPIO via hw_init.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;

/// Switching threshold: at or below 50 % the relay stays open.
const ON_THRESHOLD_PCT: u8 = 50;

/// Map a 0–100 power request to the relay level.
pub const fn power_to_level(power: u8) -> bool {
    power > ON_THRESHOLD_PCT
}

pub struct SsrDriver {
    gpio: i32,
    on: bool,
}

impl SsrDriver {
    pub fn new(gpio: i32) -> Self {
        Self { gpio, on: false }
    }

    /// Apply a 0–100 power request.
    pub fn apply_power(&mut self, power: u8) {
        let on = power_to_level(power.min(100));
        if on != self.on {
            hw_init::gpio_write(self.gpio, on);
            self.on = on;
        }
    }

    /// Open the relay unconditionally.
    pub fn off(&mut self) {
        hw_init::gpio_write(self.gpio, false);
        self.on = false;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
