//! Hardware timer module using ESP-IDF's esp_timer API.
//!
//! Creates periodic timers that push events into the lock-free SPSC queue.
//! On simulation targets the sleep loop in `main` pushes events instead.
//!
//! Timer callbacks execute in the ESP timer task context (not ISR), so
//! they can safely call push_event().

#[cfg(target_os = "espidf")]
use crate::events::{push_event, Event};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
static mut CONTROL_TIMER: esp_timer_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut SENSOR_TIMER: esp_timer_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut TELEMETRY_TIMER: esp_timer_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
unsafe extern "C" fn control_tick_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::ControlTick);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn sensor_tick_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::SensorSampleTick);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn telemetry_tick_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::TelemetryTick);
}

#[cfg(target_os = "espidf")]
unsafe fn start_periodic(
    name: &'static core::ffi::CStr,
    callback: esp_timer_cb_t,
    handle: *mut esp_timer_handle_t,
    period_us: u64,
) -> bool {
    let args = esp_timer_create_args_t {
        callback,
        arg: core::ptr::null_mut(),
        dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
        name: name.as_ptr(),
        skip_unhandled_events: false,
    };
    // SAFETY: handles are written once at boot from the single main-task
    // context before any timer callbacks fire.
    unsafe {
        if esp_timer_create(&args, handle) != ESP_OK {
            return false;
        }
        esp_timer_start_periodic(*handle, period_us) == ESP_OK
    }
}

/// Start the periodic tick timers from the loaded system config.
#[cfg(target_os = "espidf")]
pub fn start_timers(config: &crate::config::SystemConfig) {
    // SAFETY: single main-task boot context; see start_periodic().
    unsafe {
        if !start_periodic(
            c"control",
            Some(control_tick_cb),
            &raw mut CONTROL_TIMER,
            u64::from(config.control_tick_ms) * 1_000,
        ) {
            log::error!("hw_timer: control timer failed — controller will not tick");
            return;
        }
        if !start_periodic(
            c"sensor",
            Some(sensor_tick_cb),
            &raw mut SENSOR_TIMER,
            u64::from(config.sensor_sample_ms) * 1_000,
        ) {
            log::error!("hw_timer: sensor timer failed — sensors will go stale");
        }
        if !start_periodic(
            c"telemetry",
            Some(telemetry_tick_cb),
            &raw mut TELEMETRY_TIMER,
            u64::from(config.telemetry_interval_secs) * 1_000_000,
        ) {
            log::error!("hw_timer: telemetry timer failed — continuing without snapshots");
        }
    }
    info!(
        "hw_timer: control@{}ms sensor@{}ms telemetry@{}s",
        config.control_tick_ms, config.sensor_sample_ms, config.telemetry_interval_secs
    );
}

#[cfg(not(target_os = "espidf"))]
pub fn start_timers(_config: &crate::config::SystemConfig) {
    log::info!("hw_timer(sim): timers not started (events driven by sleep loop)");
}

/// Stop all periodic tick timers.
#[cfg(target_os = "espidf")]
pub fn stop_timers() {
    // SAFETY: handles are valid if start_timers() succeeded; null-check
    // prevents stopping a timer that never got created.
    unsafe {
        for timer in [CONTROL_TIMER, SENSOR_TIMER, TELEMETRY_TIMER] {
            if !timer.is_null() {
                esp_timer_stop(timer);
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn stop_timers() {}
