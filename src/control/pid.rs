//! PID controller for channel temperature regulation.
//!
//! Proportional-integral-derivative controller with anti-windup: the
//! integral accumulator is hard-clamped to ±100 so a sustained error (cold
//! enclosure, undersized heater) cannot wind it up unboundedly.  Time is
//! taken from the monotonic clock; ticks closer together than 100 ms are
//! skipped to keep the derivative term out of the noise floor.

use serde::{Deserialize, Serialize};

/// Anti-windup bound on the integral accumulator.
pub const INTEGRAL_LIMIT: f32 = 100.0;

/// Minimum elapsed time between evaluations.
const MIN_DT_SECS: f32 = 0.1;

/// Tunable PID gains, persisted with the channel config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidGains {
    fn default() -> Self {
        // Conservative defaults for a heat mat under a glass enclosure:
        // strong proportional response, slow integral, mild damping.
        Self {
            kp: 12.0,
            ki: 0.05,
            kd: 3.0,
        }
    }
}

/// PID controller state for one channel.
#[derive(Debug, Clone, Copy)]
pub struct PidController {
    gains: PidGains,
    integral: f32,
    last_error: f32,
    last_tick_us: Option<u64>,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            last_error: 0.0,
            last_tick_us: None,
        }
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Current integral accumulator (telemetry / test inspection).
    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Replace the gains.  Resets the accumulated state: stale integral
    /// wound up under the old gains would otherwise distort the output.
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
        self.reset();
    }

    /// Reset controller state (integral, last error, timing reference).
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
        self.last_tick_us = None;
    }

    /// Compute the output power for the current measurement.
    ///
    /// Returns `Some(power)` in 0–100, or `None` when the tick is skipped
    /// because less than 100 ms elapsed since the previous evaluation —
    /// the caller holds the previous power.
    ///
    /// The first evaluation after a reset has no timing reference: it
    /// seeds `last_error`/`last_tick` and returns the proportional term
    /// alone (integral is zero, derivative undefined).
    pub fn update(&mut self, target_c: f32, current_c: f32, now_us: u64) -> Option<f32> {
        let error = target_c - current_c;

        let Some(last) = self.last_tick_us else {
            self.last_tick_us = Some(now_us);
            self.last_error = error;
            return Some((self.gains.kp * error).clamp(0.0, 100.0));
        };

        let dt = now_us.saturating_sub(last) as f32 / 1_000_000.0;
        if dt < MIN_DT_SECS {
            return None;
        }

        let p = self.gains.kp * error;

        self.integral = (self.integral + error * dt).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);
        let i = self.gains.ki * self.integral;

        let d = self.gains.kd * (error - self.last_error) / dt;

        self.last_error = error;
        self.last_tick_us = Some(now_us);

        Some((p + i + d).clamp(0.0, 100.0))
    }
}
