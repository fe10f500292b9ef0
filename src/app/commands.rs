//! Inbound commands to the application service.
//!
//! The channel table is mutated from exactly one place: the control loop.
//! UI, MQTT, and HTTP handlers run on other execution contexts and never
//! touch a channel directly — they enqueue a [`ChannelCommand`] on the
//! static bounded channel below, and the loop drains the queue at the top
//! of each tick.  That serialisation is what upholds the
//! one-authority-writes-power-per-tick invariant without a lock around
//! the table.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::channel::{ControlMode, DeviceKind, FaultPolicy, NAME_LEN};
use crate::config::SafetyLimits;
use crate::control::pid::PidGains;
use crate::schedule::ScheduleSlot;
use crate::sensors::SensorId;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum ChannelCommand {
    SetEnabled {
        channel: usize,
        enabled: bool,
    },
    SetName {
        channel: usize,
        name: heapless::String<NAME_LEN>,
    },
    SetDeviceKind {
        channel: usize,
        device: DeviceKind,
    },
    /// Resets the channel's control state (PID integral, on/off memory).
    SetMode {
        channel: usize,
        mode: ControlMode,
    },
    SetTargetTemp {
        channel: usize,
        target_c: f32,
    },
    SetManualPower {
        channel: usize,
        power: u8,
    },
    AssignSensor {
        channel: usize,
        sensor: Option<SensorId>,
    },
    /// Resets the channel's PID integral.
    SetPidGains {
        channel: usize,
        gains: PidGains,
    },
    SetScheduleSlot {
        channel: usize,
        slot: usize,
        entry: ScheduleSlot,
    },
    SetSafetyLimits {
        channel: usize,
        limits: SafetyLimits,
    },
    SetFaultPolicy {
        channel: usize,
        policy: FaultPolicy,
    },
    /// Manual fault reset; silently ignored while the fault condition
    /// persists (the next telemetry snapshot shows it unchanged).
    ClearFault {
        channel: usize,
    },
    /// Persist all configs to NVS immediately.
    SaveConfig,
}

/// Queue depth — ample for a burst of UI edits between two 100 ms ticks.
const CMD_DEPTH: usize = 16;

/// Inbound command channel: UI / network handlers → control loop.
static COMMAND_QUEUE: Channel<CriticalSectionRawMutex, ChannelCommand, CMD_DEPTH> = Channel::new();

/// Enqueue a command from any execution context.
/// Returns `false` if the queue is full (command dropped).
pub fn submit(command: ChannelCommand) -> bool {
    COMMAND_QUEUE.try_send(command).is_ok()
}

/// Dequeue the next pending command.  Called only from the control loop.
pub fn try_next() -> Option<ChannelCommand> {
    COMMAND_QUEUE.try_receive().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Links the std critical-section implementation the embassy-sync
    // channel needs on the host.
    use critical_section as _;

    #[test]
    fn queue_is_fifo_and_bounded() {
        // Drain anything a previous test left behind.
        while try_next().is_some() {}

        for ch in 0..CMD_DEPTH {
            assert!(submit(ChannelCommand::ClearFault { channel: ch }));
        }
        // Full: the next submit is rejected, not blocked.
        assert!(!submit(ChannelCommand::SaveConfig));

        for expected in 0..CMD_DEPTH {
            match try_next() {
                Some(ChannelCommand::ClearFault { channel }) => assert_eq!(channel, expected),
                other => panic!("unexpected entry: {other:?}"),
            }
        }
        assert!(try_next().is_none());
    }
}
