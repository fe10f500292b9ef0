//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the output drivers, exposing them through
//! [`SensorCachePort`] and [`OutputPort`].  This is the only module in
//! the system that touches actual hardware.  On non-espidf targets, the
//! underlying drivers use cfg-gated simulation stubs.
//!
//! The physical mapping lives here: channel 0 routes to the phase dimmer
//! (level = power, exactly), channels 1–3 to their SSRs (HIGH iff
//! power > 50).

use crate::app::ports::{OutputPort, SensorCachePort};
use crate::channel::CHANNEL_COUNT;
use crate::drivers::dimmer::DimmerDriver;
use crate::drivers::ssr::SsrDriver;
use crate::pins;
use crate::sensors::ds18b20::Ds18b20Bus;
use crate::sensors::{SensorBus, SensorHub, SensorId, SensorReading};

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<B: SensorBus = Ds18b20Bus> {
    sensor_hub: SensorHub<B>,
    dimmer: DimmerDriver,
    ssrs: [SsrDriver; CHANNEL_COUNT - 1],
}

impl<B: SensorBus> HardwareAdapter<B> {
    pub fn new(sensor_hub: SensorHub<B>) -> Self {
        Self {
            sensor_hub,
            dimmer: DimmerDriver::new(),
            ssrs: pins::SSR_GPIOS.map(SsrDriver::new),
        }
    }

    /// Sample every sensor on the bus into the cache.  Called on the slow
    /// sampling cadence, never from the control tick.
    pub fn sample_sensors(&mut self, now_us: u64) {
        self.sensor_hub.sample_all(now_us);
    }

    pub fn sensor_hub(&self) -> &SensorHub<B> {
        &self.sensor_hub
    }

    pub fn sensor_hub_mut(&mut self) -> &mut SensorHub<B> {
        &mut self.sensor_hub
    }

    /// Dimmer conduction level (diagnostics).
    pub fn dimmer_level(&self) -> u8 {
        self.dimmer.current_level()
    }

    /// SSR state for channels 1–3 (diagnostics).
    pub fn ssr_on(&self, channel: usize) -> bool {
        channel
            .checked_sub(1)
            .and_then(|i| self.ssrs.get(i))
            .is_some_and(SsrDriver::is_on)
    }
}

// ── SensorCachePort implementation ────────────────────────────

impl<B: SensorBus> SensorCachePort for HardwareAdapter<B> {
    fn reading(&self, id: SensorId) -> Option<SensorReading> {
        self.sensor_hub.cache().reading(id)
    }
}

// ── OutputPort implementation ─────────────────────────────────

impl<B: SensorBus> OutputPort for HardwareAdapter<B> {
    fn write_power(&mut self, channel: usize, power: u8) {
        match channel {
            0 => self.dimmer.set_level(power),
            _ => {
                if let Some(ssr) = channel.checked_sub(1).and_then(|i| self.ssrs.get_mut(i)) {
                    ssr.apply_power(power);
                }
            }
        }
    }

    fn all_off(&mut self) {
        self.dimmer.off();
        for ssr in &mut self.ssrs {
            ssr.off();
        }
    }
}
