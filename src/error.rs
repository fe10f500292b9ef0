//! Unified error types for the HerpTherm firmware.
//!
//! Follows embedded best practice: a single `Error` enum that every subsystem
//! can convert into, keeping the top-level control loop's error handling uniform.
//! All variants are `Copy` so they can be cheaply passed through the fault
//! engine and channel table without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned out-of-range data.
    Sensor(SensorError),
    /// A physical output could not be driven.
    Output(OutputError),
    /// A channel configuration mutation was rejected.
    Channel(ChannelError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Output(e) => write!(f, "output: {e}"),
            Self::Channel(e) => write!(f, "channel: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// One-wire transaction failed (no presence pulse, CRC mismatch).
    BusReadFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// Sensor address is not present in the cache.
    UnknownSensor,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusReadFailed => write!(f, "bus read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::UnknownSensor => write!(f, "unknown sensor"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Output errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputError {
    /// GPIO set failed.
    GpioWriteFailed,
    /// Dimmer gate timer could not be armed.
    TimerArmFailed,
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::TimerArmFailed => write!(f, "gate timer arm failed"),
        }
    }
}

impl From<OutputError> for Error {
    fn from(e: OutputError) -> Self {
        Self::Output(e)
    }
}

// ---------------------------------------------------------------------------
// Channel configuration errors
// ---------------------------------------------------------------------------

/// Rejection reasons for channel configuration mutations.  All are
/// reported synchronously and leave the channel table untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// Channel index outside the fixed table.
    InvalidChannel,
    /// Device kind is not drivable by the slot's hardware kind
    /// (Light needs the phase dimmer; heat devices need an SSR).
    IncompatibleDevice,
    /// Schedule slot index outside 0..8.
    SlotOutOfRange,
    /// Schedule time outside 0..24 h / 0..60 min.
    InvalidTime,
    /// A numeric field failed range validation.
    /// The `&'static str` describes which field and why.
    InvalidRange(&'static str),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel => write!(f, "invalid channel index"),
            Self::IncompatibleDevice => write!(f, "device incompatible with slot hardware"),
            Self::SlotOutOfRange => write!(f, "schedule slot out of range"),
            Self::InvalidTime => write!(f, "schedule time out of range"),
            Self::InvalidRange(msg) => write!(f, "out of range: {msg}"),
        }
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
