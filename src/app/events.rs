//! Outbound application events.
//!
//! The engine and [`AppService`](super::service::AppService) emit these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them — log to serial, publish
//! over MQTT, refresh the display, etc.

use crate::channel::ControlMode;
use crate::fault::{FaultState, SensorHealth};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The application service has started.
    Started,

    /// Periodic per-channel telemetry snapshot.
    Telemetry(ChannelTelemetry),

    /// A fault opened on a channel.
    FaultRaised {
        channel: usize,
        fault: FaultState,
    },

    /// A channel's fault cleared (automatically or manually).
    FaultCleared {
        channel: usize,
    },

    /// A channel's configuration was mutated at runtime.
    ConfigChanged {
        channel: usize,
    },

    /// A queued command failed validation and was dropped.
    CommandRejected {
        channel: usize,
        reason: &'static str,
    },
}

/// A point-in-time channel snapshot suitable for logging or transmission.
/// Read-only: consumers cannot influence the control loop through it.
#[derive(Debug, Clone)]
pub struct ChannelTelemetry {
    pub channel: usize,
    pub name: heapless::String<{ crate::channel::NAME_LEN }>,
    pub enabled: bool,
    pub mode: ControlMode,
    pub target_c: f32,
    pub current_temp: Option<f32>,
    pub current_power: u8,
    pub heating: bool,
    pub fault: FaultState,
    pub health: SensorHealth,
}
