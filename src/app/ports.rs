//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ChannelEngine / AppService (domain)
//! ```
//!
//! Driven adapters (sensor cache, physical outputs, clock, event sinks,
//! storage) implement these traits.  The domain core consumes them via
//! generics, so it never touches hardware directly and every test runs on
//! the host against mocks.
//!
//! ## Safety notes
//!
//! - **ConfigStore** implementations MUST validate before persisting.
//!   Rejecting out-of-range values here prevents a compromised network
//!   channel from injecting dangerous operating parameters (e.g. lifting
//!   `max_temp_c` past the enclosure's survivable range).
//! - **OutputPort** implementations MUST treat power 0 as fully
//!   de-energised — fault policies rely on it.

use crate::config::{ChannelConfig, SystemConfig};
use crate::schedule::TimeOfDay;
use crate::sensors::{SensorId, SensorReading};

// ───────────────────────────────────────────────────────────────
// Sensor cache port (driven adapter: sampling task → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the control loop reads cached sensor values through
/// this.  Never a live bus transaction — staleness is metadata, not a
/// blocking retry.
pub trait SensorCachePort {
    /// Last-known reading for a sensor.  `None` when the identity is
    /// unknown or has never produced a successful sample.
    fn reading(&self, id: SensorId) -> Option<SensorReading>;
}

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the orchestrator commands physical outputs.
///
/// The adapter owns the hardware mapping: a phase-dimmer slot receives
/// `power` as a continuous 0–100 level, an SSR slot switches HIGH iff
/// `power > 50`.
pub trait OutputPort {
    /// Drive one channel's output at `power` (0–100).
    fn write_power(&mut self, channel: usize, power: u8);

    /// De-energise every output — safe shutdown.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Time source: monotonic for PID dt / fault timing, wall clock for
/// Schedule mode.
pub trait Clock {
    /// Microseconds since boot, monotonic.
    fn now_us(&self) -> u64;

    /// Wall-clock time of day.  `None` until the clock has synced
    /// (pre-NTP) — Schedule mode idles until then.
    fn time_of_day(&self) -> Option<TimeOfDay>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT,
/// display, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists configuration.  The core is agnostic to key naming.
pub trait ConfigStore {
    /// Load the system config.  Implementations return defaults when no
    /// stored config exists.
    fn load_system(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist the system config.
    fn save_system(&self, config: &SystemConfig) -> Result<(), ConfigError>;

    /// Load one channel's config.
    fn load_channel(&self, index: usize) -> Result<ChannelConfig, ConfigError>;

    /// Validate and persist one channel's config.
    fn save_channel(&self, index: usize, config: &ChannelConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage underneath [`ConfigStore`].
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic — no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively; in-memory simulation
///   achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigStore`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
