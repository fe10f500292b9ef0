//! Sensor subsystem — the one-wire bus port and the reading cache.
//!
//! The control loop never talks to the bus.  A slower sampling cadence
//! (reference: 2 s) walks every discovered sensor and writes the
//! [`SensorCache`]; the orchestrator reads last-known values plus
//! staleness metadata from the cache only, so a tick never blocks on a
//! live bus transaction.  A failed sample retains the previous value and
//! drops the `valid` flag — the fault classifier turns that into channel
//! fault state, never into a crash of the loop.

pub mod ds18b20;

use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Maximum number of sensors on the shared bus.
pub const MAX_SENSORS: usize = 8;

/// Maximum sensor name length (bytes).
pub const SENSOR_NAME_LEN: usize = 16;

/// Physically plausible DS18B20 output range (°C).
const PLAUSIBLE_RANGE_C: core::ops::RangeInclusive<f32> = -55.0..=125.0;

// ---------------------------------------------------------------------------
// Identity and readings
// ---------------------------------------------------------------------------

/// One-wire ROM code — the stable identity of a sensor on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorId(pub u64);

impl core::fmt::Display for SensorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A cached reading as handed to the control loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temp_c: f32,
    /// The most recent sample of this sensor succeeded.
    pub valid: bool,
    /// Monotonic timestamp of the last *successful* sample.
    pub read_at_us: u64,
}

// ---------------------------------------------------------------------------
// Bus port
// ---------------------------------------------------------------------------

/// The shared-bus contract the sampling task consumes.  Concrete: the
/// DS18B20 one-wire adapter; in tests, an injectable fake.
pub trait SensorBus {
    /// Enumerate sensor ROM codes currently present on the bus.
    fn discover(&mut self) -> heapless::Vec<SensorId, MAX_SENSORS>;

    /// Sample one sensor.  `None` on a failed transaction (missing
    /// presence pulse, CRC error, implausible value).
    fn sample(&mut self, id: SensorId) -> Option<f32>;
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CacheSlot {
    id: SensorId,
    name: heapless::String<SENSOR_NAME_LEN>,
    temp_c: f32,
    valid: bool,
    read_at_us: u64,
    has_reading: bool,
}

/// Last-known value + staleness metadata per sensor identity.
#[derive(Debug, Default)]
pub struct SensorCache {
    slots: heapless::Vec<CacheSlot, MAX_SENSORS>,
}

impl SensorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sensor discovered on the bus.  Idempotent; ignored when
    /// the table is full (the bus carries more sensors than we track).
    pub fn register(&mut self, id: SensorId) {
        if self.slots.iter().any(|s| s.id == id) {
            return;
        }
        let slot = CacheSlot {
            id,
            name: heapless::String::new(),
            temp_c: 0.0,
            valid: false,
            read_at_us: 0,
            has_reading: false,
        };
        if self.slots.push(slot).is_err() {
            warn!("sensor table full, ignoring {}", id);
        } else {
            info!("sensor registered: {}", id);
        }
    }

    /// Record a sample result.  `Some` updates value and timestamp;
    /// `None` drops the valid flag but retains the last value.
    pub fn record(&mut self, id: SensorId, sample: Option<f32>, now_us: u64) {
        let Some(slot) = self.slots.iter_mut().find(|s| s.id == id) else {
            return;
        };
        match sample {
            Some(t) if PLAUSIBLE_RANGE_C.contains(&t) => {
                slot.temp_c = t;
                slot.valid = true;
                slot.read_at_us = now_us;
                slot.has_reading = true;
            }
            _ => slot.valid = false,
        }
    }

    /// Cached reading for a sensor.  `None` when the identity is unknown
    /// or it has never produced a successful sample.
    pub fn reading(&self, id: SensorId) -> Option<SensorReading> {
        let slot = self.slots.iter().find(|s| s.id == id)?;
        if !slot.has_reading {
            return None;
        }
        Some(SensorReading {
            temp_c: slot.temp_c,
            valid: slot.valid,
            read_at_us: slot.read_at_us,
        })
    }

    /// Attach a human-readable label to a sensor (for UI listings).
    pub fn set_name(&mut self, id: SensorId, name: &str) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        match heapless::String::try_from(name) {
            Ok(n) => {
                slot.name = n;
                true
            }
            Err(_) => false,
        }
    }

    pub fn name(&self, id: SensorId) -> Option<&str> {
        self.slots
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.as_str())
    }

    /// All known sensor identities, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.slots.iter().map(|s| s.id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Owns the bus and the cache; runs on the slow sampling cadence.
pub struct SensorHub<B: SensorBus> {
    bus: B,
    cache: SensorCache,
    discovered: bool,
}

impl<B: SensorBus> SensorHub<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            cache: SensorCache::new(),
            discovered: false,
        }
    }

    /// Sample every known sensor into the cache.  Runs bus discovery on
    /// the first call and again whenever the bus reports no devices (a
    /// sensor may have been plugged in since boot).
    pub fn sample_all(&mut self, now_us: u64) {
        if !self.discovered || self.cache.is_empty() {
            for id in self.bus.discover() {
                self.cache.register(id);
            }
            self.discovered = true;
        }

        for i in 0..self.cache.len() {
            let id = self.cache.slots[i].id;
            let sample = self.bus.sample(id);
            self.cache.record(id, sample, now_us);
        }
    }

    pub fn cache(&self) -> &SensorCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut SensorCache {
        &mut self.cache
    }
}
