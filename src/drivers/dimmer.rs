//! Phase-angle dimmer driver (channel 0).
//!
//! Classic leading-edge triac dimming: the zero-cross detector interrupts
//! at every mains half-cycle; a one-shot timer then fires the triac gate
//! after a delay proportional to `100 - level`, so level 100 conducts the
//! full half-cycle and level 0 never fires the gate.
//!
//! The requested level lives in an atomic shared with the zero-cross ISR —
//! the driver never blocks, and the ISR never takes a lock.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: real zero-cross ISR + esp_timer gate pulse via hw_init.
//! On host/test: the atomic level is all there is.

use core::sync::atomic::{AtomicU8, Ordering};

#[cfg(target_os = "espidf")]
use crate::pins;

/// Requested conduction level (0–100), read by the zero-cross ISR path.
static LEVEL_ATOMIC: AtomicU8 = AtomicU8::new(0);

/// Gate-delay lookup for the current level: microseconds after the zero
/// crossing at which the gate fires.  Level 0 returns `None` (no firing).
#[cfg(target_os = "espidf")]
fn gate_delay_us(level: u8) -> Option<u64> {
    if level == 0 {
        return None;
    }
    let level = u64::from(level.min(100));
    // Keep a small margin at both ends so the gate pulse never straddles
    // the next crossing.
    let span = u64::from(pins::HALF_CYCLE_US) - 400;
    Some(200 + span * (100 - level) / 100)
}

/// Called from the zero-cross GPIO ISR (via hw_init): arms the one-shot
/// gate timer for this half-cycle.
#[cfg(target_os = "espidf")]
pub fn on_zero_cross() {
    let level = LEVEL_ATOMIC.load(Ordering::Relaxed);
    if let Some(delay) = gate_delay_us(level) {
        hw_init::arm_gate_timer(delay);
    }
}

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

pub struct DimmerDriver {
    hw_level: u8,
}

impl Default for DimmerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DimmerDriver {
    pub fn new() -> Self {
        Self { hw_level: 0 }
    }

    /// Set the conduction level, 0–100.  The PhaseDimmer contract: the
    /// physical output level equals the requested power exactly.
    pub fn set_level(&mut self, level: u8) {
        let level = level.min(100);
        LEVEL_ATOMIC.store(level, Ordering::Relaxed);
        self.hw_level = level;
    }

    /// Stop conducting.
    pub fn off(&mut self) {
        self.set_level(0);
    }

    pub fn current_level(&self) -> u8 {
        self.hw_level
    }
}
