//! Per-channel daily temperature schedule.
//!
//! A channel in Schedule mode follows a fixed table of up to eight
//! `(hour, minute) → target` slots.  Each tick the dispatcher asks for the
//! target of the most recently *started* enabled slot — the slot whose
//! time-of-day is the latest one not after the current time.  Before the
//! wall clock is synced (pre-NTP) no slot is active and the channel idles
//! at power 0.
//!
//! Slots deliberately carry no day-of-week field: the table repeats every
//! day.  Day-specific behaviour, if ever needed, belongs to a higher-level
//! scheduler and must not be bolted on here.

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Number of schedule slots per channel.
pub const SLOT_COUNT: usize = 8;

/// Wall-clock time of day as reported by the time adapter.
/// `None` at the adapter level means the clock is not yet synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    /// Minutes since midnight — the comparison key for slot selection.
    pub const fn minutes(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

/// A single schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub enabled: bool,
    /// Start hour, 0–23.
    pub hour: u8,
    /// Start minute, 0–59.
    pub minute: u8,
    /// Target temperature while this slot is the active one.
    pub target_c: f32,
}

impl Default for ScheduleSlot {
    fn default() -> Self {
        Self {
            enabled: false,
            hour: 0,
            minute: 0,
            target_c: 25.0,
        }
    }
}

impl ScheduleSlot {
    const fn start_minutes(&self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

/// Fixed table of schedule slots for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Schedule {
    slots: [ScheduleSlot; SLOT_COUNT],
}

impl Schedule {
    /// Read a slot.  `None` for an out-of-range index.
    pub fn slot(&self, index: usize) -> Option<&ScheduleSlot> {
        self.slots.get(index)
    }

    /// Replace a slot.  Index and time are validated; on rejection the
    /// table is untouched.
    pub fn set_slot(&mut self, index: usize, slot: ScheduleSlot) -> Result<(), ChannelError> {
        if index >= SLOT_COUNT {
            return Err(ChannelError::SlotOutOfRange);
        }
        if slot.hour > 23 || slot.minute > 59 {
            return Err(ChannelError::InvalidTime);
        }
        self.slots[index] = slot;
        Ok(())
    }

    /// Target of the most recently started enabled slot, i.e. the enabled
    /// slot with the latest start time not after `now`.  `None` when no
    /// enabled slot has started yet today.
    pub fn active_target(&self, now: TimeOfDay) -> Option<f32> {
        let now_min = now.minutes();
        let mut best: Option<(u16, f32)> = None;
        for slot in self.slots.iter().filter(|s| s.enabled) {
            let start = slot.start_minutes();
            if start > now_min {
                continue;
            }
            // `>=` so a later slot at the same start time wins.
            if best.map_or(true, |(b, _)| start >= b) {
                best = Some((start, slot.target_c));
            }
        }
        best.map(|(_, target)| target)
    }

    /// Number of enabled slots.
    pub fn enabled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.enabled).count()
    }
}
