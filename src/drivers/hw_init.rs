//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions, the zero-cross interrupt, and the dimmer
//! gate timers using raw ESP-IDF sys calls. Called once from `main()`
//! before the event loop starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    TimerCreateFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::TimerCreateFailed(rc) => write!(f, "gate timer create failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before event loop; single-threaded.
    unsafe {
        init_gpio_outputs()?;
        init_gpio_inputs()?;
        init_gate_timers()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO outputs (SSRs + dimmer gate) ─────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    let mut mask: u64 = 1u64 << pins::DIMMER_GATE_GPIO;
    for gpio in pins::SSR_GPIOS {
        mask |= 1u64 << gpio;
    }
    let cfg = gpio_config_t {
        pin_bit_mask: mask,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    // All outputs de-energised until the engine writes them.
    for gpio in pins::SSR_GPIOS {
        unsafe { gpio_set_level(gpio, 0) };
    }
    unsafe { gpio_set_level(pins::DIMMER_GATE_GPIO, 0) };
    Ok(())
}

// ── GPIO inputs (zero-cross detector) ─────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::ZERO_CROSS_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_POSEDGE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

/// Install the GPIO ISR service and attach the zero-cross handler.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    unsafe extern "C" fn zero_cross_isr(_arg: *mut core::ffi::c_void) {
        crate::drivers::dimmer::on_zero_cross();
    }

    // SAFETY: called once at boot from the main task.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        let ret = gpio_isr_handler_add(
            pins::ZERO_CROSS_GPIO,
            Some(zero_cross_isr),
            core::ptr::null_mut(),
        );
        if ret != ESP_OK {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
    }
    info!("hw_init: zero-cross ISR attached");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    Ok(())
}

// ── GPIO write shim ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn gpio_write(gpio: i32, high: bool) {
    // SAFETY: pins are configured as outputs in init_gpio_outputs().
    unsafe {
        gpio_set_level(gpio, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_gpio: i32, _high: bool) {}

// ── Dimmer gate timers ────────────────────────────────────────
//
// Two one-shot esp_timers: GATE_TIMER fires the triac gate after the
// phase delay; PULSE_TIMER drops the gate again once the triac has
// latched (~50 µs).

#[cfg(target_os = "espidf")]
static mut GATE_TIMER: esp_timer_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut PULSE_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// Gate pulse width (µs) — long enough to latch any common triac.
#[cfg(target_os = "espidf")]
const GATE_PULSE_US: u64 = 50;

#[cfg(target_os = "espidf")]
unsafe extern "C" fn gate_fire_cb(_arg: *mut core::ffi::c_void) {
    gpio_write(pins::DIMMER_GATE_GPIO, true);
    // SAFETY: PULSE_TIMER is created in init_gate_timers() before any
    // zero-cross interrupt can arm the gate timer.
    unsafe {
        esp_timer_start_once(PULSE_TIMER, GATE_PULSE_US);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn gate_drop_cb(_arg: *mut core::ffi::c_void) {
    gpio_write(pins::DIMMER_GATE_GPIO, false);
}

#[cfg(target_os = "espidf")]
unsafe fn init_gate_timers() -> Result<(), HwInitError> {
    let gate_args = esp_timer_create_args_t {
        callback: Some(gate_fire_cb),
        arg: core::ptr::null_mut(),
        dispatch_method: esp_timer_dispatch_t_ESP_TIMER_ISR,
        name: c"dim-gate".as_ptr(),
        skip_unhandled_events: true,
    };
    // SAFETY: GATE_TIMER/PULSE_TIMER written once at boot, main task only.
    let ret = unsafe { esp_timer_create(&gate_args, &raw mut GATE_TIMER) };
    if ret != ESP_OK {
        return Err(HwInitError::TimerCreateFailed(ret));
    }

    let pulse_args = esp_timer_create_args_t {
        callback: Some(gate_drop_cb),
        arg: core::ptr::null_mut(),
        dispatch_method: esp_timer_dispatch_t_ESP_TIMER_ISR,
        name: c"dim-pulse".as_ptr(),
        skip_unhandled_events: true,
    };
    let ret = unsafe { esp_timer_create(&pulse_args, &raw mut PULSE_TIMER) };
    if ret != ESP_OK {
        return Err(HwInitError::TimerCreateFailed(ret));
    }
    Ok(())
}

/// Arm the one-shot gate timer `delay_us` after the zero crossing.
/// Called from the zero-cross ISR via the dimmer driver.
#[cfg(target_os = "espidf")]
pub fn arm_gate_timer(delay_us: u64) {
    // SAFETY: GATE_TIMER is valid once init_gate_timers() has run; a
    // pending one-shot is restarted rather than double-armed.
    unsafe {
        let timer = GATE_TIMER;
        if !timer.is_null() {
            esp_timer_stop(timer);
            esp_timer_start_once(timer, delay_us);
        }
    }
}
