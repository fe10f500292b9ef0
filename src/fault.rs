//! Per-channel fault classification.
//!
//! The classifier runs **every tick before mode dispatch** and decides
//! whether normal control is suspended.  Unlike an ad-hoc chain of if/else
//! checks, the precedence rules live in one pure transition function
//! ([`step`]) with a fixed priority table:
//!
//! ```text
//!   OverTemp > UnderTemp > SensorInvalid > SensorStale > None
//! ```
//!
//! Only one fault is held at a time.  Temperature faults clear
//! automatically with 1 °C of hysteresis past the limit; sensor faults
//! clear automatically only when `auto_resume` is configured, otherwise
//! they persist until an explicit, validated [`FaultClassifier::clear`].

use log::{error, info};

use crate::config::SafetyLimits;

/// Hysteresis band for clearing temperature faults (°C).
const TEMP_CLEAR_HYSTERESIS_C: f32 = 1.0;

// ---------------------------------------------------------------------------
// Sensor health
// ---------------------------------------------------------------------------

/// Health of a channel's assigned sensor, as seen this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorHealth {
    #[default]
    Ok,
    /// Last valid reading is older than the configured fault timeout.
    Stale,
    /// The cached reading is flagged invalid, or no sensor is assigned.
    Invalid,
}

impl SensorHealth {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Stale => "stale",
            Self::Invalid => "invalid",
        }
    }
}

// ---------------------------------------------------------------------------
// Fault state
// ---------------------------------------------------------------------------

/// Active fault on a channel.  Ordered by ascending priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultState {
    #[default]
    None,
    SensorStale,
    SensorInvalid,
    UnderTemp,
    OverTemp,
}

impl FaultState {
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::None)
    }

    pub const fn is_sensor_related(self) -> bool {
        matches!(self, Self::SensorStale | Self::SensorInvalid)
    }

    /// Position in the precedence table.  Higher wins.
    pub const fn priority(self) -> u8 {
        match self {
            Self::None => 0,
            Self::SensorStale => 1,
            Self::SensorInvalid => 2,
            Self::UnderTemp => 3,
            Self::OverTemp => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SensorStale => "sensor stale",
            Self::SensorInvalid => "sensor invalid",
            Self::UnderTemp => "under temperature",
            Self::OverTemp => "over temperature",
        }
    }
}

// ---------------------------------------------------------------------------
// Per-tick inputs
// ---------------------------------------------------------------------------

/// Everything one fault evaluation needs, gathered by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct FaultCheck {
    /// The channel's mode regulates against a sensor.  Off and Manual run
    /// open-loop; sensor-health checks are skipped entirely for them.
    pub sensor_relevant: bool,
    /// The cached reading is flagged valid.
    pub reading_valid: bool,
    /// Seconds since the last valid reading; `None` if there never was one.
    pub reading_age_secs: Option<f32>,
    /// Cached temperature — `Some` exactly when the reading is valid.
    /// Temperature limits are checked against this regardless of mode.
    pub temp_c: Option<f32>,
}

/// Sensor health from the raw validity/age inputs.
fn classify_health(check: &FaultCheck, limits: &SafetyLimits) -> SensorHealth {
    if !check.reading_valid {
        return SensorHealth::Invalid;
    }
    match check.reading_age_secs {
        Some(age) if age <= f32::from(limits.fault_timeout_secs) => SensorHealth::Ok,
        _ => SensorHealth::Stale,
    }
}

/// Pure fault transition function.
///
/// `health` is `None` when sensor checks are skipped this tick (Off/Manual
/// mode) — an active sensor fault then persists untouched.
pub fn step(
    current: FaultState,
    health: Option<SensorHealth>,
    temp_c: Option<f32>,
    limits: &SafetyLimits,
) -> FaultState {
    use FaultState::{None as NoFault, OverTemp, SensorInvalid, SensorStale, UnderTemp};

    let mut current = current;

    // Temperature limits: evaluated on any valid reading, regardless of
    // mode.  Highest priority, overrides any other fault.
    if let Some(t) = temp_c {
        if t >= limits.max_temp_c {
            return OverTemp;
        }
        if current == OverTemp {
            if t >= limits.max_temp_c - TEMP_CLEAR_HYSTERESIS_C {
                return OverTemp;
            }
            current = NoFault;
        }
        if t <= limits.min_temp_c {
            return UnderTemp;
        }
        if current == UnderTemp {
            if t <= limits.min_temp_c + TEMP_CLEAR_HYSTERESIS_C {
                return UnderTemp;
            }
            current = NoFault;
        }
    } else if matches!(current, OverTemp | UnderTemp) {
        // A temperature fault cannot clear without a valid reading.
        return current;
    }

    // Sensor health: opens a new fault only when none is active; clears
    // only on recovery with auto-resume configured.
    match health {
        Some(SensorHealth::Invalid) if current == NoFault => SensorInvalid,
        Some(SensorHealth::Stale) if current == NoFault => SensorStale,
        Some(SensorHealth::Ok) if current.is_sensor_related() && limits.auto_resume => NoFault,
        _ => current,
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Holds one channel's fault state across ticks and applies [`step`].
#[derive(Debug, Default)]
pub struct FaultClassifier {
    state: FaultState,
    health: SensorHealth,
    since_us: Option<u64>,
}

impl FaultClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FaultState {
        self.state
    }

    pub fn health(&self) -> SensorHealth {
        self.health
    }

    /// Monotonic timestamp at which the active fault opened.
    pub fn since_us(&self) -> Option<u64> {
        self.since_us
    }

    /// Evaluate one tick.  Returns the (possibly unchanged) fault state.
    pub fn evaluate(&mut self, check: &FaultCheck, limits: &SafetyLimits, now_us: u64) -> FaultState {
        let health = if check.sensor_relevant {
            self.health = classify_health(check, limits);
            Some(self.health)
        } else {
            // Sensor checks skipped entirely for open-loop modes; the
            // last evaluated health is left as-is.
            None
        };

        let next = step(self.state, health, check.temp_c, limits);
        self.transition_to(next, now_us);
        next
    }

    /// Manual fault reset.  Fails — returning `false` with no mutation —
    /// while the condition that opened the fault is still present:
    /// over-temperature with the temperature still at or above the limit,
    /// or a sensor fault with the reading still invalid.
    pub fn clear(&mut self, reading_valid: bool, temp_c: Option<f32>, limits: &SafetyLimits) -> bool {
        match self.state {
            FaultState::None => return true,
            FaultState::OverTemp => {
                if temp_c.is_none_or(|t| t >= limits.max_temp_c) {
                    return false;
                }
            }
            FaultState::SensorStale | FaultState::SensorInvalid => {
                if !reading_valid {
                    return false;
                }
            }
            FaultState::UnderTemp => {}
        }
        info!("fault '{}' cleared manually", self.state.label());
        self.state = FaultState::None;
        self.health = SensorHealth::Ok;
        self.since_us = None;
        true
    }

    fn transition_to(&mut self, next: FaultState, now_us: u64) {
        if next == self.state {
            return;
        }
        if next.is_active() {
            error!(
                "FAULT SET: {} (was {})",
                next.label(),
                self.state.label()
            );
            self.since_us = Some(now_us);
        } else {
            info!("FAULT CLEARED: {}", self.state.label());
            self.since_us = None;
        }
        self.state = next;
    }
}
