//! Mock hardware adapters for integration tests.
//!
//! Records every output write so tests can assert on the full command
//! history without touching real GPIO/PWM registers, and lets tests
//! script the sensor cache tick by tick.

use std::collections::HashMap;

use herptherm::app::events::AppEvent;
use herptherm::app::ports::{
    Clock, ConfigError, ConfigStore, EventSink, OutputPort, SensorCachePort, StorageError,
    StoragePort,
};
use herptherm::channel::CHANNEL_COUNT;
use herptherm::config::{ChannelConfig, SystemConfig};
use herptherm::schedule::TimeOfDay;
use herptherm::sensors::{SensorId, SensorReading};

// ── MockHardware ──────────────────────────────────────────────

/// Scriptable sensor cache + recording output port.
pub struct MockHardware {
    readings: HashMap<u64, SensorReading>,
    /// Every `write_power` call, in order.
    pub writes: Vec<(usize, u8)>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            readings: HashMap::new(),
            writes: Vec::new(),
        }
    }

    /// Set or update a sensor's cached reading.
    pub fn set_reading(&mut self, id: SensorId, temp_c: f32, valid: bool, read_at_us: u64) {
        self.readings.insert(
            id.0,
            SensorReading {
                temp_c,
                valid,
                read_at_us,
            },
        );
    }

    /// Drop a sensor from the cache entirely.
    pub fn remove_sensor(&mut self, id: SensorId) {
        self.readings.remove(&id.0);
    }

    /// Last power written to a channel.
    pub fn last_power(&self, channel: usize) -> Option<u8> {
        self.writes
            .iter()
            .rev()
            .find(|(ch, _)| *ch == channel)
            .map(|(_, p)| *p)
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorCachePort for MockHardware {
    fn reading(&self, id: SensorId) -> Option<SensorReading> {
        self.readings.get(&id.0).copied()
    }
}

impl OutputPort for MockHardware {
    fn write_power(&mut self, channel: usize, power: u8) {
        self.writes.push((channel, power));
    }

    fn all_off(&mut self) {
        for channel in 0..CHANNEL_COUNT {
            self.writes.push((channel, 0));
        }
    }
}

// ── MockClock ─────────────────────────────────────────────────

/// Test clock with settable monotonic time and time-of-day.
pub struct MockClock {
    pub now_us: std::cell::Cell<u64>,
    pub time_of_day: std::cell::Cell<Option<TimeOfDay>>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn new() -> Self {
        Self {
            now_us: std::cell::Cell::new(0),
            time_of_day: std::cell::Cell::new(None),
        }
    }

    pub fn advance_secs(&self, secs: f32) {
        let now = self.now_us.get() + (secs * 1_000_000.0) as u64;
        self.now_us.set(now);
    }

    pub fn set_time_of_day(&self, hour: u8, minute: u8) {
        self.time_of_day.set(Some(TimeOfDay { hour, minute }));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_us(&self) -> u64 {
        self.now_us.get()
    }

    fn time_of_day(&self) -> Option<TimeOfDay> {
        self.time_of_day.get()
    }
}

// ── MockNvs ───────────────────────────────────────────────────

pub struct MockNvs {
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self {
            store: std::cell::RefCell::new(HashMap::new()),
        }
    }

    pub fn saved_keys(&self) -> usize {
        self.store.borrow().len()
    }
}

impl Default for MockNvs {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = format!("{}::{}", namespace, key);
        match self.store.borrow().get(&k) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let k = format!("{}::{}", namespace, key);
        self.store.borrow_mut().insert(k, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store
            .borrow()
            .contains_key(&format!("{}::{}", namespace, key))
    }
}

impl ConfigStore for MockNvs {
    fn load_system(&self) -> Result<SystemConfig, ConfigError> {
        Ok(SystemConfig::default())
    }

    fn save_system(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.store
            .borrow_mut()
            .insert("herptherm::syscfg".into(), bytes);
        Ok(())
    }

    fn load_channel(&self, index: usize) -> Result<ChannelConfig, ConfigError> {
        let key = format!("herptherm::ch{index}");
        match self.store.borrow().get(&key) {
            Some(bytes) => postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted),
            None => Ok(ChannelConfig::default_for_slot(index)),
        }
    }

    fn save_channel(&self, index: usize, config: &ChannelConfig) -> Result<(), ConfigError> {
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.store
            .borrow_mut()
            .insert(format!("herptherm::ch{index}"), bytes);
        Ok(())
    }
}

// ── Recording event sink ──────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn fault_raised_on(&self, channel: usize) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, AppEvent::FaultRaised { channel: ch, .. } if *ch == channel))
    }

    pub fn fault_cleared_on(&self, channel: usize) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, AppEvent::FaultCleared { channel: ch } if *ch == channel))
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
