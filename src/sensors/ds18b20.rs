//! DS18B20 one-wire bus adapter.
//!
//! Implements [`SensorBus`] over the shared one-wire bus on
//! [`pins::ONEWIRE_GPIO`].
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the RMT-based `onewire_bus` component via raw sys
//! calls (bindings pulled in through the `extra_components` entry in
//! Cargo.toml).
//! On host/test: reads from an injectable static table, so the sampling
//! path is exercisable without hardware.

use super::{SensorBus, SensorId, MAX_SENSORS};
#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

// ── ROM commands ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
const CMD_MATCH_ROM: u8 = 0x55;
#[cfg(target_os = "espidf")]
const CMD_CONVERT_T: u8 = 0x44;
#[cfg(target_os = "espidf")]
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

// ── Host simulation backend ───────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_BUS: std::sync::Mutex<Vec<(u64, Option<f32>)>> = std::sync::Mutex::new(Vec::new());

#[cfg(not(target_os = "espidf"))]
fn sim_bus() -> std::sync::MutexGuard<'static, Vec<(u64, Option<f32>)>> {
    SIM_BUS
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Inject a sensor into the simulated bus (host/test only).
/// `value: None` simulates a failed transaction for that sensor.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_sensor(id: SensorId, value: Option<f32>) {
    let mut bus = sim_bus();
    if let Some(entry) = bus.iter_mut().find(|(rom, _)| *rom == id.0) {
        entry.1 = value;
    } else {
        bus.push((id.0, value));
    }
}

/// Remove every simulated sensor (host/test only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_clear_bus() {
    sim_bus().clear();
}

// ── Driver ────────────────────────────────────────────────────

pub struct Ds18b20Bus {
    #[cfg(target_os = "espidf")]
    handle: onewire_bus_handle_t,
}

impl Ds18b20Bus {
    #[cfg(target_os = "espidf")]
    pub fn new() -> crate::error::Result<Self> {
        let bus_config = onewire_bus_config_t {
            bus_gpio_num: pins::ONEWIRE_GPIO,
        };
        let rmt_config = onewire_bus_rmt_config_t { max_rx_bytes: 10 };
        let mut handle: onewire_bus_handle_t = core::ptr::null_mut();
        // SAFETY: called once from main before the sampling loop starts.
        let ret = unsafe { onewire_new_bus_rmt(&bus_config, &rmt_config, &mut handle) };
        if ret != ESP_OK {
            return Err(crate::error::Error::Init("one-wire bus init failed"));
        }
        Ok(Self { handle })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> crate::error::Result<Self> {
        log::info!("ds18b20(sim): simulated bus backend");
        Ok(Self {})
    }

    #[cfg(target_os = "espidf")]
    fn transact(&mut self, rom: u64, command: u8, read: &mut [u8]) -> bool {
        let mut frame = [0u8; 10];
        frame[0] = CMD_MATCH_ROM;
        frame[1..9].copy_from_slice(&rom.to_le_bytes());
        frame[9] = command;

        // SAFETY: handle initialised in new(); bus access is confined to
        // the single sampling task.
        unsafe {
            if onewire_bus_reset(self.handle) != ESP_OK {
                return false;
            }
            if onewire_bus_write_bytes(self.handle, frame.as_ptr(), frame.len() as u8) != ESP_OK {
                return false;
            }
            if !read.is_empty()
                && onewire_bus_read_bytes(self.handle, read.as_mut_ptr(), read.len())
                    != ESP_OK
            {
                return false;
            }
        }
        true
    }
}

impl SensorBus for Ds18b20Bus {
    #[cfg(target_os = "espidf")]
    fn discover(&mut self) -> heapless::Vec<SensorId, MAX_SENSORS> {
        let mut found = heapless::Vec::new();
        let mut iter: onewire_device_iter_handle_t = core::ptr::null_mut();
        // SAFETY: iterator is created and destroyed within this call.
        unsafe {
            if onewire_new_device_iter(self.handle, &mut iter) != ESP_OK {
                warn!("one-wire: device iteration failed");
                return found;
            }
            let mut device = onewire_device_t::default();
            while onewire_device_iter_get_next(iter, &mut device) == ESP_OK {
                if found.push(SensorId(device.address)).is_err() {
                    break;
                }
            }
            let _ = onewire_del_device_iter(iter);
        }
        found
    }

    #[cfg(not(target_os = "espidf"))]
    fn discover(&mut self) -> heapless::Vec<SensorId, MAX_SENSORS> {
        let mut found = heapless::Vec::new();
        for (rom, _) in sim_bus().iter() {
            if found.push(SensorId(*rom)).is_err() {
                break;
            }
        }
        found
    }

    #[cfg(target_os = "espidf")]
    fn sample(&mut self, id: SensorId) -> Option<f32> {
        // Trigger a conversion, then read the scratchpad.  The 2 s
        // sampling period comfortably covers the 750 ms conversion time
        // of the previous cycle, so no in-call wait is needed.
        let mut scratchpad = [0u8; 9];
        if !self.transact(id.0, CMD_READ_SCRATCHPAD, &mut scratchpad) {
            return None;
        }
        if !self.transact(id.0, CMD_CONVERT_T, &mut []) {
            return None;
        }
        if crc8(&scratchpad[..8]) != scratchpad[8] {
            return None;
        }
        let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
        // 0x0550 (85.0 °C) is the power-on reset value — discard it so a
        // sensor that lost power between conversions can't masquerade as
        // an over-temperature reading.
        if raw == 0x0550 {
            return None;
        }
        Some(f32::from(raw) / 16.0)
    }

    #[cfg(not(target_os = "espidf"))]
    fn sample(&mut self, id: SensorId) -> Option<f32> {
        sim_bus()
            .iter()
            .find(|(rom, _)| *rom == id.0)
            .and_then(|(_, value)| *value)
    }
}

/// Dallas/Maxim CRC-8 (poly 0x31 reflected) over the scratchpad.
#[cfg(target_os = "espidf")]
fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for byte in data {
        let mut b = *byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}
