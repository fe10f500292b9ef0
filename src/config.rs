//! System and per-channel configuration.
//!
//! All tunable parameters for the HerpTherm controller.  Values can be
//! overridden at runtime (display UI, MQTT, HTTP) and are persisted to NVS
//! as postcard blobs — one per channel plus one system blob.

use serde::{Deserialize, Serialize};

use crate::channel::{ControlMode, DeviceKind, FaultPolicy, HardwareKind, NAME_LEN};
use crate::control::pid::PidGains;
use crate::error::ChannelError;
use crate::schedule::Schedule;
use crate::sensors::SensorId;

// ---------------------------------------------------------------------------
// System configuration
// ---------------------------------------------------------------------------

/// Global timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Control loop tick period (milliseconds).
    pub control_tick_ms: u32,
    /// One-wire bus sampling period (milliseconds).  Slower than the
    /// control tick: the loop reads the cache, never the bus.
    pub sensor_sample_ms: u32,
    /// Telemetry snapshot interval (seconds).
    pub telemetry_interval_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            control_tick_ms: 100,     // 10 Hz
            sensor_sample_ms: 2_000,  // DS18B20 conversion budget
            telemetry_interval_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Safety limits
// ---------------------------------------------------------------------------

/// Per-channel hard safety configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Over-temperature limit (°C).  At or above this the channel is
    /// forced off regardless of mode or fault policy.
    pub max_temp_c: f32,
    /// Under-temperature limit (°C).
    pub min_temp_c: f32,
    /// Sensor-reading age (seconds) beyond which the channel faults stale.
    pub fault_timeout_secs: u16,
    /// Output behaviour while a non-over-temp fault is active.
    pub policy: FaultPolicy,
    /// Power ceiling for [`FaultPolicy::CapPower`] (percent).
    pub cap_power_pct: u8,
    /// Clear sensor faults automatically once the sensor reads valid again.
    pub auto_resume: bool,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_temp_c: 40.0,
            min_temp_c: 10.0,
            // Well above the 2 s sampling period — a single missed
            // conversion must not trip the stale fault.
            fault_timeout_secs: 30,
            policy: FaultPolicy::ForceOff,
            cap_power_pct: 30,
            auto_resume: true,
        }
    }
}

impl SafetyLimits {
    pub fn validate(&self) -> Result<(), ChannelError> {
        if !self.max_temp_c.is_finite() || !self.min_temp_c.is_finite() {
            return Err(ChannelError::InvalidRange("temperature limits must be finite"));
        }
        if self.min_temp_c >= self.max_temp_c {
            return Err(ChannelError::InvalidRange("min limit must be below max limit"));
        }
        if self.cap_power_pct > 100 {
            return Err(ChannelError::InvalidRange("cap power above 100 %"));
        }
        if self.fault_timeout_secs == 0 {
            return Err(ChannelError::InvalidRange("fault timeout must be nonzero"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Channel configuration
// ---------------------------------------------------------------------------

/// Persisted configuration for one output channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub enabled: bool,
    pub name: heapless::String<NAME_LEN>,
    pub device: DeviceKind,
    pub mode: ControlMode,
    /// Regulation target (°C) for Pid and OnOff modes.
    pub target_c: f32,
    /// Output power (percent) in Manual mode.
    pub manual_power: u8,
    /// Assigned sensor, if any.
    pub sensor: Option<SensorId>,
    pub gains: PidGains,
    pub schedule: Schedule,
    pub safety: SafetyLimits,
}

impl ChannelConfig {
    /// Factory defaults for a slot.  Slot 0 (dimmer) ships as the basking
    /// light; SSR slots ship as heat mats.  All channels start disabled —
    /// the keeper enables them after wiring.
    pub fn default_for_slot(index: usize) -> Self {
        let (name, device) = match HardwareKind::for_slot(index) {
            HardwareKind::PhaseDimmer => ("Basking light", DeviceKind::Light),
            HardwareKind::SolidStateRelay => ("Heat mat", DeviceKind::HeatMat),
        };
        Self {
            enabled: false,
            name: heapless::String::try_from(name).unwrap_or_default(),
            device,
            mode: ControlMode::Off,
            target_c: 28.0,
            manual_power: 0,
            sensor: None,
            gains: PidGains::default(),
            schedule: Schedule::default(),
            safety: SafetyLimits::default(),
        }
    }
}
