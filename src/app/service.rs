//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the channel engine and is the **single writer** of
//! the channel table.  External mutations (display UI, MQTT, HTTP) arrive
//! through the static command queue and are drained here, at the top of
//! each control tick, before the engine runs — so per tick there is
//! exactly one authority over every channel's power, and configuration
//! changes never race the control sequence.
//!
//! ```text
//!  SensorCachePort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                      │       AppService        │
//!  command queue ─────▶│  Engine · Faults · PID  │
//!       OutputPort ◀── └────────────────────────┘
//! ```

use log::{info, warn};

use crate::channel::CHANNEL_COUNT;
use crate::config::SystemConfig;
use crate::engine::ChannelEngine;

use super::commands::{self, ChannelCommand};
use super::events::AppEvent;
use super::ports::{Clock, ConfigStore, EventSink, OutputPort, SensorCachePort};

/// Seconds a dirty config sits before the debounced auto-save fires.
const AUTO_SAVE_DEBOUNCE_SECS: f32 = 5.0;

/// The application service orchestrates all domain logic.
pub struct AppService {
    engine: ChannelEngine,
    system: SystemConfig,
    /// Seconds per control tick (derived from config).
    tick_secs: f32,
    tick_count: u64,
    config_dirty: bool,
    dirty_since_tick: u64,
}

impl AppService {
    /// Construct the service from loaded configuration.
    pub fn new(system: SystemConfig, engine: ChannelEngine) -> Self {
        let tick_secs = system.control_tick_ms as f32 / 1000.0;
        Self {
            engine,
            system,
            tick_secs,
            tick_count: 0,
            config_dirty: false,
            dirty_since_tick: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started);
        info!("AppService started ({} channels)", CHANNEL_COUNT);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle: drain commands → engine tick.
    ///
    /// The `hw` parameter satisfies **both** [`SensorCachePort`] and
    /// [`OutputPort`] — this avoids a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorCachePort + OutputPort),
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;

        // External mutations first, serialized through the queue: the
        // engine below then runs against a stable table.
        while let Some(cmd) = commands::try_next() {
            self.handle_command(cmd, sink);
        }

        let now_us = clock.now_us();
        let time_of_day = clock.time_of_day();
        self.engine.tick(hw, now_us, time_of_day, sink);
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply one external command.  Validation failures are logged,
    /// emitted as [`AppEvent::CommandRejected`], and mutate nothing.
    pub fn handle_command(&mut self, cmd: ChannelCommand, sink: &mut impl EventSink) {
        use ChannelCommand as C;

        let (channel, result) = match cmd {
            C::SetEnabled { channel, enabled } => (channel, self.engine.set_enabled(channel, enabled)),
            C::SetName { channel, ref name } => (channel, self.engine.set_name(channel, name)),
            C::SetDeviceKind { channel, device } => (channel, self.engine.set_device_kind(channel, device)),
            C::SetMode { channel, mode } => (channel, self.engine.set_mode(channel, mode)),
            C::SetTargetTemp { channel, target_c } => (channel, self.engine.set_target(channel, target_c)),
            C::SetManualPower { channel, power } => (channel, self.engine.set_manual_power(channel, power)),
            C::AssignSensor { channel, sensor } => (channel, self.engine.assign_sensor(channel, sensor)),
            C::SetPidGains { channel, gains } => (channel, self.engine.set_pid_gains(channel, gains)),
            C::SetScheduleSlot { channel, slot, entry } => {
                (channel, self.engine.set_schedule_slot(channel, slot, entry))
            }
            C::SetSafetyLimits { channel, limits } => {
                (channel, self.engine.set_safety_limits(channel, limits))
            }
            C::SetFaultPolicy { channel, policy } => {
                (channel, self.engine.set_fault_policy(channel, policy))
            }
            C::ClearFault { channel } => {
                if self.engine.clear_fault(channel) {
                    sink.emit(&AppEvent::FaultCleared { channel });
                } else {
                    warn!("channel {channel}: fault clear refused");
                }
                return;
            }
            C::SaveConfig => {
                // Force the debounce window open so the next auto-save
                // check flushes immediately.
                self.mark_config_dirty();
                self.dirty_since_tick = 0;
                info!("explicit config save requested");
                return;
            }
        };

        match result {
            Ok(()) => {
                self.mark_config_dirty();
                sink.emit(&AppEvent::ConfigChanged { channel });
            }
            Err(e) => {
                warn!("channel {channel}: command rejected ({e})");
                sink.emit(&AppEvent::CommandRejected {
                    channel,
                    reason: match e {
                        crate::error::ChannelError::InvalidChannel => "invalid channel index",
                        crate::error::ChannelError::IncompatibleDevice => "incompatible device",
                        crate::error::ChannelError::SlotOutOfRange => "slot out of range",
                        crate::error::ChannelError::InvalidTime => "invalid time",
                        crate::error::ChannelError::InvalidRange(msg) => msg,
                    },
                });
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn engine(&self) -> &ChannelEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ChannelEngine {
        &mut self.engine
    }

    pub fn system_config(&self) -> &SystemConfig {
        &self.system
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Emit a telemetry snapshot for every channel.
    pub fn emit_telemetry(&self, sink: &mut impl EventSink) {
        for channel in 0..CHANNEL_COUNT {
            if let Some(t) = self.engine.telemetry(channel) {
                sink.emit(&AppEvent::Telemetry(t));
            }
        }
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.
    pub fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_tick = self.tick_count;
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }

    /// Check if auto-save should trigger (5 s after the last change).
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, store: &impl ConfigStore) -> bool {
        if !self.config_dirty {
            return false;
        }
        let ticks_since_dirty = self.tick_count.saturating_sub(self.dirty_since_tick);
        let secs_since_dirty = ticks_since_dirty as f32 * self.tick_secs;
        if secs_since_dirty < AUTO_SAVE_DEBOUNCE_SECS {
            return false;
        }
        self.save_all(store)
    }

    /// Force-save if dirty (call before reboot or halt).
    pub fn force_save_if_dirty(&mut self, store: &impl ConfigStore) {
        if self.config_dirty {
            self.save_all(store);
        }
    }

    fn save_all(&mut self, store: &impl ConfigStore) -> bool {
        let mut ok = true;
        for channel in 0..CHANNEL_COUNT {
            if let Some(ch) = self.engine.channel(channel) {
                if let Err(e) = store.save_channel(channel, ch.config()) {
                    warn!("channel {channel}: config save failed ({e})");
                    ok = false;
                }
            }
        }
        if let Err(e) = store.save_system(&self.system) {
            warn!("system config save failed ({e})");
            ok = false;
        }
        if ok {
            self.config_dirty = false;
            info!("config saved to NVS");
        }
        ok
    }
}
