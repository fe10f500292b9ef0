//! Output channel table types.
//!
//! A [`Channel`] is one physical output slot: identity (slot index and the
//! board-fixed hardware kind), the persisted [`ChannelConfig`], the per-mode
//! control state, the fault classifier, and the runtime values the control
//! loop derives each tick.
//!
//! The board has [`CHANNEL_COUNT`] slots.  Slot 0 is wired to the
//! phase-angle dimmer; slots 1–3 to solid-state relays.  That binding is
//! fixed at construction and only ever *validated against* — assigning a
//! device the slot hardware cannot drive is rejected with no mutation.

use serde::{Deserialize, Serialize};

use crate::config::ChannelConfig;
use crate::control::dispatch::ControlState;
use crate::control::pid::PidGains;
use crate::error::ChannelError;
use crate::fault::FaultClassifier;
use crate::schedule::ScheduleSlot;
use crate::sensors::SensorId;

/// Number of physical output slots on the board.
pub const CHANNEL_COUNT: usize = 4;

/// Maximum channel name length (bytes).
pub const NAME_LEN: usize = 16;

/// Plausible DS18B20 range — targets outside it are configuration errors.
const TEMP_RANGE_C: core::ops::RangeInclusive<f32> = -40.0..=85.0;

// ---------------------------------------------------------------------------
// Slot hardware and connected device
// ---------------------------------------------------------------------------

/// The output stage a slot is wired to.  Fixed per slot at board layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardwareKind {
    /// Continuously variable AC phase-angle dimmer (0–100 level).
    PhaseDimmer,
    /// Digital on/off solid-state relay.
    SolidStateRelay,
}

impl HardwareKind {
    /// Hardware kind for a slot index — slot 0 carries the dimmer.
    pub const fn for_slot(index: usize) -> Self {
        if index == 0 {
            Self::PhaseDimmer
        } else {
            Self::SolidStateRelay
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PhaseDimmer => "phase dimmer",
            Self::SolidStateRelay => "solid-state relay",
        }
    }
}

/// What is plugged into the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    Light,
    HeatMat,
    CeramicHeater,
    HeatCable,
    Fogger,
    Mister,
}

impl DeviceKind {
    /// Lights need fine-grained dimming; everything else switches via SSR.
    pub const fn compatible_with(self, hardware: HardwareKind) -> bool {
        match self {
            Self::Light => matches!(hardware, HardwareKind::PhaseDimmer),
            _ => matches!(hardware, HardwareKind::SolidStateRelay),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::HeatMat => "heat mat",
            Self::CeramicHeater => "ceramic heater",
            Self::HeatCable => "heat cable",
            Self::Fogger => "fogger",
            Self::Mister => "mister",
        }
    }
}

// ---------------------------------------------------------------------------
// Control mode and fault policy
// ---------------------------------------------------------------------------

/// Configured regulation mode for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    Off,
    Manual,
    Pid,
    OnOff,
    Schedule,
}

impl ControlMode {
    /// Modes that regulate against a sensor.  Off and Manual run open-loop,
    /// so sensor-health checks are skipped for them entirely.
    pub const fn uses_sensor(self) -> bool {
        !matches!(self, Self::Off | Self::Manual)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Manual => "manual",
            Self::Pid => "PID",
            Self::OnOff => "on/off",
            Self::Schedule => "schedule",
        }
    }
}

/// What a channel does with its output while a non-over-temp fault is
/// active.  Over-temperature always forces power 0 regardless of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultPolicy {
    ForceOff,
    HoldLastPower,
    CapPower,
}

impl FaultPolicy {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ForceOff => "force off",
            Self::HoldLastPower => "hold last power",
            Self::CapPower => "cap power",
        }
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// One output slot: config, control state, fault state, runtime values.
pub struct Channel {
    index: usize,
    hardware: HardwareKind,
    pub(crate) config: ChannelConfig,
    pub(crate) state: ControlState,
    pub(crate) fault: FaultClassifier,

    // Runtime, derived each tick.
    pub(crate) current_temp: Option<f32>,
    pub(crate) current_power: u8,
    pub(crate) heating: bool,
    pub(crate) last_valid_read_us: Option<u64>,
    pub(crate) last_valid_temp: Option<f32>,
    pub(crate) last_valid_power: u8,
}

impl Channel {
    /// Construct a channel from a persisted config.  Rejects a config whose
    /// device kind the slot hardware cannot drive (e.g. stale NVS blob
    /// after a board revision).
    pub fn new(index: usize, config: ChannelConfig) -> Result<Self, ChannelError> {
        if !config.device.compatible_with(HardwareKind::for_slot(index)) {
            return Err(ChannelError::IncompatibleDevice);
        }
        Ok(Self::from_parts(index, config))
    }

    /// Factory-default channel for a slot.  Slot defaults are compatible
    /// by construction, so no validation is needed.
    pub fn with_defaults(index: usize) -> Self {
        Self::from_parts(index, ChannelConfig::default_for_slot(index))
    }

    fn from_parts(index: usize, config: ChannelConfig) -> Self {
        let state = ControlState::for_mode(config.mode, config.gains);
        Self {
            index,
            hardware: HardwareKind::for_slot(index),
            config,
            state,
            fault: FaultClassifier::new(),
            current_temp: None,
            current_power: 0,
            heating: false,
            last_valid_read_us: None,
            last_valid_temp: None,
            last_valid_power: 0,
        }
    }

    // ── Identity / read-only state ────────────────────────────

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn hardware(&self) -> HardwareKind {
        self.hardware
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn current_temp(&self) -> Option<f32> {
        self.current_temp
    }

    pub fn current_power(&self) -> u8 {
        self.current_power
    }

    pub fn heating(&self) -> bool {
        self.heating
    }

    pub fn last_valid_temp(&self) -> Option<f32> {
        self.last_valid_temp
    }

    /// Last power computed during fault-free operation — what the
    /// HoldLastPower fault policy falls back to.
    pub fn last_valid_power(&self) -> u8 {
        self.last_valid_power
    }

    pub fn fault_state(&self) -> crate::fault::FaultState {
        self.fault.state()
    }

    pub fn sensor_health(&self) -> crate::fault::SensorHealth {
        self.fault.health()
    }

    /// Monotonic timestamp at which the active fault opened.
    pub fn fault_since_us(&self) -> Option<u64> {
        self.fault.since_us()
    }

    /// PID integral accumulator, when the active mode carries one.
    pub fn pid_integral(&self) -> Option<f32> {
        self.state.pid().map(crate::control::pid::PidController::integral)
    }

    // ── Configuration mutation (validated, no mutation on error) ──

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), ChannelError> {
        self.config.name = heapless::String::try_from(name)
            .map_err(|_| ChannelError::InvalidRange("name longer than 16 bytes"))?;
        Ok(())
    }

    pub fn set_device_kind(&mut self, device: DeviceKind) -> Result<(), ChannelError> {
        if !device.compatible_with(self.hardware) {
            return Err(ChannelError::IncompatibleDevice);
        }
        self.config.device = device;
        Ok(())
    }

    /// Change the control mode.  Rebuilds the per-mode control state, which
    /// structurally resets PID integral / last-error and on/off hysteresis.
    pub fn set_mode(&mut self, mode: ControlMode) {
        self.config.mode = mode;
        self.state = ControlState::for_mode(mode, self.config.gains);
    }

    pub fn set_target(&mut self, target_c: f32) -> Result<(), ChannelError> {
        if !target_c.is_finite() || !TEMP_RANGE_C.contains(&target_c) {
            return Err(ChannelError::InvalidRange("target outside -40..85 °C"));
        }
        self.config.target_c = target_c;
        Ok(())
    }

    pub fn set_manual_power(&mut self, power: u8) -> Result<(), ChannelError> {
        if power > 100 {
            return Err(ChannelError::InvalidRange("manual power above 100 %"));
        }
        self.config.manual_power = power;
        Ok(())
    }

    pub fn assign_sensor(&mut self, sensor: Option<SensorId>) {
        self.config.sensor = sensor;
    }

    /// Replace the PID gains.  Resets the integral accumulator.
    pub fn set_pid_gains(&mut self, gains: PidGains) -> Result<(), ChannelError> {
        if !gains.kp.is_finite() || !gains.ki.is_finite() || !gains.kd.is_finite() {
            return Err(ChannelError::InvalidRange("PID gains must be finite"));
        }
        self.config.gains = gains;
        if let Some(pid) = self.state.pid_mut() {
            pid.set_gains(gains);
        }
        Ok(())
    }

    pub fn set_schedule_slot(&mut self, slot: usize, entry: ScheduleSlot) -> Result<(), ChannelError> {
        if !entry.target_c.is_finite() || !TEMP_RANGE_C.contains(&entry.target_c) {
            return Err(ChannelError::InvalidRange("slot target outside -40..85 °C"));
        }
        self.config.schedule.set_slot(slot, entry)
    }

    pub fn set_safety_limits(&mut self, limits: crate::config::SafetyLimits) -> Result<(), ChannelError> {
        limits.validate()?;
        self.config.safety = limits;
        Ok(())
    }

    pub fn set_fault_policy(&mut self, policy: FaultPolicy) {
        self.config.safety.policy = policy;
    }

    /// Replace the whole config, as from a persisted blob.
    pub fn set_config(&mut self, config: ChannelConfig) -> Result<(), ChannelError> {
        if !config.device.compatible_with(self.hardware) {
            return Err(ChannelError::IncompatibleDevice);
        }
        config.safety.validate()?;
        self.state = ControlState::for_mode(config.mode, config.gains);
        self.config = config;
        Ok(())
    }
}
