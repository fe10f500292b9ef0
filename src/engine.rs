//! Channel orchestrator — owns the channel table and drives the per-tick
//! update sequence.
//!
//! Per channel, in index order:
//!
//! 1. Refresh the cached reading by the channel's sensor assignment.
//! 2. Disabled channels are forced to power 0 and skip the rest.
//! 3. Run the fault classifier.
//! 4. Fault active → fault policy; otherwise → mode dispatch.  Exactly one
//!    of the two writes the channel's power this tick, never both.
//! 5. Write the resulting power to the physical output port.
//!
//! A single channel's fault never halts the other channels: every step is
//! per-channel state, and nothing here returns early out of the loop.

use log::{info, warn};

use crate::app::events::{AppEvent, ChannelTelemetry};
use crate::app::ports::{EventSink, OutputPort, SensorCachePort};
use crate::channel::{
    Channel, ControlMode, DeviceKind, FaultPolicy, CHANNEL_COUNT,
};
use crate::config::{ChannelConfig, SafetyLimits};
use crate::control::dispatch::{dispatch, ControlOutput};
use crate::control::pid::PidGains;
use crate::error::ChannelError;
use crate::fault::{FaultCheck, FaultState, SensorHealth};
use crate::schedule::{ScheduleSlot, TimeOfDay};
use crate::sensors::SensorId;

/// Output while a fault is active.  Over-temperature is a non-overridable
/// safety ceiling; every other fault obeys the configured policy.
fn fault_output(fault: FaultState, safety: &SafetyLimits, last_valid_power: u8) -> ControlOutput {
    if fault == FaultState::OverTemp {
        return ControlOutput::OFF;
    }
    match safety.policy {
        FaultPolicy::ForceOff => ControlOutput::OFF,
        FaultPolicy::HoldLastPower => ControlOutput {
            power: last_valid_power,
            heating: last_valid_power > 0,
        },
        FaultPolicy::CapPower => ControlOutput {
            power: safety.cap_power_pct,
            heating: safety.cap_power_pct > 0,
        },
    }
}

/// The fixed channel table and its per-tick algorithm.
pub struct ChannelEngine {
    channels: [Channel; CHANNEL_COUNT],
}

impl ChannelEngine {
    /// Build the table from persisted configs.  A config the slot hardware
    /// rejects (stale blob after a board revision) falls back to slot
    /// defaults rather than refusing to start the controller.
    pub fn new(configs: [ChannelConfig; CHANNEL_COUNT]) -> Self {
        let mut configs = configs.map(Some);
        let channels = core::array::from_fn(|i| {
            let config = configs[i]
                .take()
                .unwrap_or_else(|| ChannelConfig::default_for_slot(i));
            match Channel::new(i, config) {
                Ok(ch) => ch,
                Err(e) => {
                    warn!("channel {i}: stored config rejected ({e}), using defaults");
                    Channel::with_defaults(i)
                }
            }
        });
        Self { channels }
    }

    /// Factory-default table.
    pub fn with_defaults() -> Self {
        Self {
            channels: core::array::from_fn(Channel::with_defaults),
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control tick over every channel.
    ///
    /// `hw` satisfies both [`SensorCachePort`] and [`OutputPort`]: reads
    /// and writes interleave per channel, so one adapter serves both sides.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorCachePort + OutputPort),
        now_us: u64,
        time_of_day: Option<TimeOfDay>,
        sink: &mut impl EventSink,
    ) {
        for ch in &mut self.channels {
            let index = ch.index();

            // 1. Refresh the cached reading.
            let reading = ch.config.sensor.and_then(|id| hw.reading(id));
            if let Some(r) = reading {
                if r.valid {
                    ch.current_temp = Some(r.temp_c);
                    ch.last_valid_temp = Some(r.temp_c);
                    ch.last_valid_read_us = Some(r.read_at_us);
                }
            }
            let reading_valid = reading.is_some_and(|r| r.valid);
            let valid_temp = if reading_valid { ch.current_temp } else { None };

            // 2. Disabled channels are forced off; no fault evaluation.
            if !ch.config.enabled {
                ch.current_power = 0;
                ch.heating = false;
                hw.write_power(index, 0);
                continue;
            }

            // 3. Fault classification.
            let prev_fault = ch.fault.state();
            let check = FaultCheck {
                sensor_relevant: ch.config.mode.uses_sensor(),
                reading_valid,
                reading_age_secs: ch
                    .last_valid_read_us
                    .map(|t| now_us.saturating_sub(t) as f32 / 1_000_000.0),
                temp_c: valid_temp,
            };
            let fault = ch.fault.evaluate(&check, &ch.config.safety, now_us);
            if fault != prev_fault {
                if fault.is_active() {
                    sink.emit(&AppEvent::FaultRaised {
                        channel: index,
                        fault,
                    });
                } else {
                    sink.emit(&AppEvent::FaultCleared { channel: index });
                }
            }

            // 4. Exactly one authority computes this tick's power.
            let out = if fault.is_active() {
                fault_output(fault, &ch.config.safety, ch.last_valid_power)
            } else {
                let prev = ControlOutput {
                    power: ch.current_power,
                    heating: ch.heating,
                };
                let out = dispatch(
                    &mut ch.state,
                    &ch.config,
                    valid_temp,
                    now_us,
                    time_of_day,
                    prev,
                );
                // Fault-free power is what HoldLastPower later falls back to.
                ch.last_valid_power = out.power;
                out
            };
            ch.current_power = out.power;
            ch.heating = out.heating;

            // 5. Physical output write (the adapter applies the
            //    dimmer-level vs. SSR bang-bang mapping).
            hw.write_power(index, out.power);
        }
    }

    // ── Fault control ─────────────────────────────────────────

    /// Manual fault reset.  Returns `false` — with no mutation — while the
    /// condition that opened the fault is still present.
    pub fn clear_fault(&mut self, channel: usize) -> bool {
        let Some(ch) = self.channels.get_mut(channel) else {
            return false;
        };
        let reading_valid = ch.fault.health() != SensorHealth::Invalid;
        let cleared = ch
            .fault
            .clear(reading_valid, ch.current_temp, &ch.config.safety);
        if cleared {
            info!("channel {channel}: fault cleared");
        }
        cleared
    }

    // ── Configuration mutation API ────────────────────────────
    //
    // All setters validate synchronously and leave the table untouched on
    // rejection.  They are called only from the control-loop context (the
    // command queue's single consumer).

    pub fn set_enabled(&mut self, channel: usize, enabled: bool) -> Result<(), ChannelError> {
        self.channel_mut(channel)?.set_enabled(enabled);
        Ok(())
    }

    pub fn set_name(&mut self, channel: usize, name: &str) -> Result<(), ChannelError> {
        self.channel_mut(channel)?.set_name(name)
    }

    pub fn set_device_kind(&mut self, channel: usize, device: DeviceKind) -> Result<(), ChannelError> {
        self.channel_mut(channel)?.set_device_kind(device)
    }

    pub fn set_mode(&mut self, channel: usize, mode: ControlMode) -> Result<(), ChannelError> {
        self.channel_mut(channel)?.set_mode(mode);
        Ok(())
    }

    pub fn set_target(&mut self, channel: usize, target_c: f32) -> Result<(), ChannelError> {
        self.channel_mut(channel)?.set_target(target_c)
    }

    pub fn set_manual_power(&mut self, channel: usize, power: u8) -> Result<(), ChannelError> {
        self.channel_mut(channel)?.set_manual_power(power)
    }

    pub fn assign_sensor(&mut self, channel: usize, sensor: Option<SensorId>) -> Result<(), ChannelError> {
        self.channel_mut(channel)?.assign_sensor(sensor);
        Ok(())
    }

    pub fn set_pid_gains(&mut self, channel: usize, gains: PidGains) -> Result<(), ChannelError> {
        self.channel_mut(channel)?.set_pid_gains(gains)
    }

    pub fn set_schedule_slot(
        &mut self,
        channel: usize,
        slot: usize,
        entry: ScheduleSlot,
    ) -> Result<(), ChannelError> {
        self.channel_mut(channel)?.set_schedule_slot(slot, entry)
    }

    pub fn set_safety_limits(&mut self, channel: usize, limits: SafetyLimits) -> Result<(), ChannelError> {
        self.channel_mut(channel)?.set_safety_limits(limits)
    }

    pub fn set_fault_policy(&mut self, channel: usize, policy: FaultPolicy) -> Result<(), ChannelError> {
        self.channel_mut(channel)?.set_fault_policy(policy);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn channel(&self, channel: usize) -> Option<&Channel> {
        self.channels.get(channel)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Read-only snapshot of one channel for UI / MQTT / logging.
    pub fn telemetry(&self, channel: usize) -> Option<ChannelTelemetry> {
        let ch = self.channels.get(channel)?;
        Some(ChannelTelemetry {
            channel,
            name: ch.config().name.clone(),
            enabled: ch.config().enabled,
            mode: ch.config().mode,
            target_c: ch.config().target_c,
            current_temp: ch.current_temp(),
            current_power: ch.current_power(),
            heating: ch.heating(),
            fault: ch.fault_state(),
            health: ch.sensor_health(),
        })
    }

    fn channel_mut(&mut self, channel: usize) -> Result<&mut Channel, ChannelError> {
        self.channels.get_mut(channel).ok_or(ChannelError::InvalidChannel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorReading;

    const SEC: u64 = 1_000_000;
    const SENSOR: SensorId = SensorId(0x28_0000_0001);

    /// Combined sensor-cache + output mock: one shared reading for every
    /// sensor id, and the last power written per channel.
    struct MockHw {
        reading: Option<SensorReading>,
        last: [u8; CHANNEL_COUNT],
    }

    impl MockHw {
        fn new(temp_c: f32, valid: bool, read_at_us: u64) -> Self {
            Self {
                reading: Some(SensorReading {
                    temp_c,
                    valid,
                    read_at_us,
                }),
                last: [0; CHANNEL_COUNT],
            }
        }
    }

    impl SensorCachePort for MockHw {
        fn reading(&self, _id: SensorId) -> Option<SensorReading> {
            self.reading
        }
    }

    impl OutputPort for MockHw {
        fn write_power(&mut self, channel: usize, power: u8) {
            self.last[channel] = power;
        }

        fn all_off(&mut self) {
            self.last = [0; CHANNEL_COUNT];
        }
    }

    struct NullSink;

    impl EventSink for NullSink {
        fn emit(&mut self, _event: &AppEvent) {}
    }

    fn engine_with_manual_channel(power: u8) -> ChannelEngine {
        let mut engine = ChannelEngine::with_defaults();
        engine.set_enabled(1, true).unwrap();
        engine.set_mode(1, ControlMode::Manual).unwrap();
        engine.set_manual_power(1, power).unwrap();
        engine.assign_sensor(1, Some(SENSOR)).unwrap();
        engine
    }

    #[test]
    fn disabled_channel_is_forced_off() {
        let mut engine = ChannelEngine::with_defaults();
        let mut hw = MockHw::new(25.0, true, 0);
        engine.tick(&mut hw, SEC, None, &mut NullSink);
        assert_eq!(hw.last, [0; CHANNEL_COUNT]);
    }

    #[test]
    fn over_temp_overrides_manual_power() {
        // mode=Manual, manual_power=80, max=40, current=41 ⇒ power 0.
        let mut engine = engine_with_manual_channel(80);
        let mut hw = MockHw::new(41.0, true, 0);

        engine.tick(&mut hw, SEC, None, &mut NullSink);
        assert_eq!(engine.channel(1).unwrap().fault_state(), FaultState::OverTemp);
        assert_eq!(hw.last[1], 0);
        assert_eq!(engine.channel(1).unwrap().current_power(), 0);
    }

    #[test]
    fn manual_power_applies_when_fault_free() {
        let mut engine = engine_with_manual_channel(80);
        let mut hw = MockHw::new(25.0, true, 0);
        engine.tick(&mut hw, SEC, None, &mut NullSink);
        assert_eq!(hw.last[1], 80);
        assert!(engine.channel(1).unwrap().heating());
    }

    #[test]
    fn clear_fault_rejects_bad_index() {
        let mut engine = ChannelEngine::with_defaults();
        assert!(!engine.clear_fault(CHANNEL_COUNT));
    }

    #[test]
    fn invalid_channel_index_rejected() {
        let mut engine = ChannelEngine::with_defaults();
        assert_eq!(
            engine.set_mode(CHANNEL_COUNT, ControlMode::Off),
            Err(ChannelError::InvalidChannel)
        );
    }

    #[test]
    fn one_channel_fault_does_not_halt_others() {
        let mut engine = engine_with_manual_channel(80);
        engine.set_enabled(2, true).unwrap();
        engine.set_mode(2, ControlMode::Manual).unwrap();
        engine.set_manual_power(2, 60).unwrap();

        // Channel 1's sensor reads over-temp; channel 2 has no sensor and
        // runs open-loop.
        let mut hw = MockHw::new(45.0, true, 0);
        engine.tick(&mut hw, SEC, None, &mut NullSink);

        assert_eq!(hw.last[1], 0, "faulted channel forced off");
        assert_eq!(hw.last[2], 60, "healthy channel keeps running");
    }

    #[test]
    fn hold_last_power_policy_holds_pre_fault_power() {
        let mut engine = engine_with_manual_channel(70);
        let mut limits = SafetyLimits::default();
        limits.policy = FaultPolicy::HoldLastPower;
        limits.auto_resume = false;
        engine.set_safety_limits(1, limits).unwrap();

        // Healthy tick at 70 %.
        let mut hw = MockHw::new(25.0, true, 0);
        engine.tick(&mut hw, SEC, None, &mut NullSink);
        assert_eq!(hw.last[1], 70);

        // Sensor goes invalid — Manual mode skips sensor-health checks, so
        // switch to PID first to make the fault open.
        engine.set_mode(1, ControlMode::Pid).unwrap();
        hw.reading = Some(SensorReading {
            temp_c: 25.0,
            valid: true,
            read_at_us: SEC,
        });
        engine.tick(&mut hw, 2 * SEC, None, &mut NullSink);
        let held = engine.channel(1).unwrap().current_power();

        hw.reading = Some(SensorReading {
            temp_c: 25.0,
            valid: false,
            read_at_us: SEC,
        });
        engine.tick(&mut hw, 3 * SEC, None, &mut NullSink);
        assert_eq!(
            engine.channel(1).unwrap().fault_state(),
            FaultState::SensorInvalid
        );
        assert_eq!(hw.last[1], held, "policy holds the last fault-free power");
    }

    #[test]
    fn cap_power_policy_caps_output() {
        let mut engine = engine_with_manual_channel(70);
        let mut limits = SafetyLimits::default();
        limits.policy = FaultPolicy::CapPower;
        limits.cap_power_pct = 25;
        limits.auto_resume = false;
        engine.set_safety_limits(1, limits).unwrap();
        engine.set_mode(1, ControlMode::Pid).unwrap();

        let mut hw = MockHw::new(25.0, false, 0);
        engine.tick(&mut hw, SEC, None, &mut NullSink);
        assert_eq!(hw.last[1], 25);
    }

    #[test]
    fn telemetry_snapshot_reflects_runtime() {
        let mut engine = engine_with_manual_channel(80);
        let mut hw = MockHw::new(25.0, true, 0);
        engine.tick(&mut hw, SEC, None, &mut NullSink);

        let t = engine.telemetry(1).unwrap();
        assert_eq!(t.channel, 1);
        assert_eq!(t.current_power, 80);
        assert_eq!(t.current_temp, Some(25.0));
        assert_eq!(t.fault, FaultState::None);
        assert!(engine.telemetry(CHANNEL_COUNT).is_none());
    }
}
