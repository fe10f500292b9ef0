//! Per-mode control dispatch.
//!
//! Runs only while the channel has no active fault, and is then the single
//! authority over the channel's output power for that tick.
//!
//! Each mode's runtime state lives in its own [`ControlState`] variant —
//! a Manual channel simply has no PID accumulator to forget to reset, and
//! switching mode rebuilds the variant, so integral/last-error and on/off
//! hysteresis reset structurally.

use crate::channel::ControlMode;
use crate::config::ChannelConfig;
use crate::control::pid::{PidController, PidGains};
use crate::schedule::TimeOfDay;

/// Power above which a PID-driven channel reports itself as heating.
const HEATING_THRESHOLD_PCT: u8 = 5;

/// Half-width of the on/off dead-band (°C) — 1 °C total.
const ONOFF_BAND_C: f32 = 0.5;

/// Requested output for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlOutput {
    /// Requested power, 0–100.
    pub power: u8,
    /// Channel considers itself actively heating.
    pub heating: bool,
}

impl ControlOutput {
    pub const OFF: Self = Self {
        power: 0,
        heating: false,
    };
}

/// Per-mode runtime state.  Exactly the state the active mode needs.
#[derive(Debug, Clone, Copy)]
pub enum ControlState {
    /// Off — no state.
    Idle,
    /// Manual — the configured power is applied directly.
    Manual,
    /// Closed-loop PID toward the configured target.
    Pid(PidController),
    /// Bang-bang thermostat; remembers its side of the dead-band.
    OnOff { power: u8, heating: bool },
    /// Schedule-driven PID toward the active slot's target.
    Schedule(PidController),
}

impl ControlState {
    pub fn for_mode(mode: ControlMode, gains: PidGains) -> Self {
        match mode {
            ControlMode::Off => Self::Idle,
            ControlMode::Manual => Self::Manual,
            ControlMode::Pid => Self::Pid(PidController::new(gains)),
            ControlMode::OnOff => Self::OnOff {
                power: 0,
                heating: false,
            },
            ControlMode::Schedule => Self::Schedule(PidController::new(gains)),
        }
    }

    pub fn pid(&self) -> Option<&PidController> {
        match self {
            Self::Pid(pid) | Self::Schedule(pid) => Some(pid),
            _ => None,
        }
    }

    pub fn pid_mut(&mut self) -> Option<&mut PidController> {
        match self {
            Self::Pid(pid) | Self::Schedule(pid) => Some(pid),
            _ => None,
        }
    }
}

/// Compute the requested power for one fault-free tick.
///
/// `reading` is the cached temperature when valid.  `prev` is the output
/// of the previous tick, held when a PID evaluation is skipped (sub-100 ms
/// dt).  `time_of_day` is `None` before the wall clock has synced.
pub fn dispatch(
    state: &mut ControlState,
    config: &ChannelConfig,
    reading: Option<f32>,
    now_us: u64,
    time_of_day: Option<TimeOfDay>,
    prev: ControlOutput,
) -> ControlOutput {
    match state {
        ControlState::Idle => ControlOutput::OFF,

        ControlState::Manual => ControlOutput {
            power: config.manual_power,
            heating: config.manual_power > 0,
        },

        ControlState::Pid(pid) => run_pid(pid, config.target_c, reading, now_us, prev),

        ControlState::OnOff { power, heating } => {
            let Some(current) = reading else {
                return ControlOutput::OFF;
            };
            if current < config.target_c - ONOFF_BAND_C {
                *power = 100;
                *heating = true;
            } else if current > config.target_c + ONOFF_BAND_C {
                *power = 0;
                *heating = false;
            }
            // Inside the dead-band: hold the previous side (hysteresis).
            ControlOutput {
                power: *power,
                heating: *heating,
            }
        }

        ControlState::Schedule(pid) => {
            let Some(target) = time_of_day.and_then(|tod| config.schedule.active_target(tod))
            else {
                // Clock unsynced, or no enabled slot has started today.
                return ControlOutput::OFF;
            };
            run_pid(pid, target, reading, now_us, prev)
        }
    }
}

fn run_pid(
    pid: &mut PidController,
    target_c: f32,
    reading: Option<f32>,
    now_us: u64,
    prev: ControlOutput,
) -> ControlOutput {
    let Some(current) = reading else {
        return ControlOutput::OFF;
    };
    match pid.update(target_c, current, now_us) {
        Some(power) => {
            let power = power.round() as u8;
            ControlOutput {
                power,
                heating: power > HEATING_THRESHOLD_PCT,
            }
        }
        // Tick skipped (dt below the derivative noise floor): hold.
        None => prev,
    }
}
