//! ESP32 time adapter.
//!
//! Implements the [`Clock`] port:
//!
//! - **`target_os = "espidf"`** — monotonic time wraps
//!   `esp_timer_get_time()` (microsecond precision); time-of-day comes
//!   from the system RTC once SNTP has synced it.
//! - **`not(target_os = "espidf")`** — uses `std::time::Instant` for
//!   host-side testing and simulation; time-of-day is always `None`.

use crate::app::ports::Clock;
use crate::schedule::TimeOfDay;

/// Time adapter for the ESP32-S3 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl Clock for Esp32TimeAdapter {
    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    fn now_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Current time of day from the system clock.  `None` if the wall
    /// clock is not yet synced (e.g. pre-NTP).
    #[cfg(target_os = "espidf")]
    fn time_of_day(&self) -> Option<TimeOfDay> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: plain libc-style calls with valid out-pointers.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        // Reject obviously unsynced time (e.g. before 2020-01-01).
        const EPOCH_2020: i64 = 1_577_836_800;
        if tv.tv_sec < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        if !(0..=23).contains(&tm.tm_hour) || !(0..=59).contains(&tm.tm_min) {
            return None;
        }
        Some(TimeOfDay {
            hour: tm.tm_hour as u8,
            minute: tm.tm_min as u8,
        })
    }

    /// Time of day. On non-ESP targets (simulation) always `None`.
    #[cfg(not(target_os = "espidf"))]
    fn time_of_day(&self) -> Option<TimeOfDay> {
        None
    }
}
